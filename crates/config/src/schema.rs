use std::{collections::BTreeMap, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root of `msgsync.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgsyncConfig {
    pub discord: DiscordConfig,
    pub sync: SyncConfig,
    pub metrics: MetricsConfig,
}

/// Discord bot credentials and gateway settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token from the developer portal.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Application (client) id. Learned from the gateway when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    /// Guild the slash commands are registered in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,

    /// Messages kept per channel so edit notifications carry the old text.
    pub message_cache_size: usize,
}

impl DiscordConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"[REDACTED]")
            .field("application_id", &self.application_id)
            .field("guild_id", &self.guild_id)
            .field("message_cache_size", &self.message_cache_size)
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            application_id: None,
            guild_id: None,
            message_cache_size: 500,
        }
    }
}

/// Fan-out and edit propagation tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound for a single send or edit, in seconds.
    pub operation_timeout_secs: u64,

    /// Deliver at most once per recipient within one `/sync`.
    pub dedupe_recipients: bool,
}

impl SyncConfig {
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs.max(1))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            operation_timeout_secs: 10,
            dedupe_recipients: false,
        }
    }
}
