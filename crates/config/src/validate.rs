//! Configuration validation.
//!
//! Produces diagnostics instead of failing fast so `msgsync check` can report
//! every problem at once. Any `Error` diagnostic makes startup fatal.

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    loader::{apply_overrides_with, find_config_file, load_config},
    schema::MsgsyncConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "discord.guild_id"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Error diagnostics joined into one line, for startup failures.
    #[must_use]
    pub fn error_summary(&self) -> String {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

/// Discord ids are non-zero unsigned 64-bit integers. Surrounding whitespace
/// is ignored, as it is when the id is used.
#[must_use]
pub fn is_snowflake(raw: &str) -> bool {
    raw.trim().parse::<u64>().is_ok_and(|id| id != 0)
}

/// Load the given or discovered config file, apply environment overrides,
/// and validate the result.
///
/// A file that cannot be read or parsed is reported as an error diagnostic
/// against its path; the remaining checks then run on defaults.
#[must_use]
pub fn load_and_validate(explicit: Option<&Path>) -> (MsgsyncConfig, ValidationResult) {
    let path = explicit.map(Path::to_path_buf).or_else(find_config_file);
    load_and_validate_with(path, |name| std::env::var(name).ok())
}

fn load_and_validate_with(
    path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> (MsgsyncConfig, ValidationResult) {
    let (mut config, load_error) = match path.as_deref() {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            match load_config(p) {
                Ok(config) => (config, None),
                Err(e) => (MsgsyncConfig::default(), Some(e.to_string())),
            }
        },
        None => {
            debug!("no config file found, using defaults");
            (MsgsyncConfig::default(), None)
        },
    };
    apply_overrides_with(&mut config, lookup);

    let mut result = validate(&config, path);
    if let Some(message) = load_error {
        result.diagnostics.insert(0, Diagnostic {
            severity: Severity::Error,
            path: "file",
            message,
        });
    }
    (config, result)
}

/// Check a loaded (and env-overridden) configuration.
#[must_use]
pub fn validate(config: &MsgsyncConfig, config_path: Option<PathBuf>) -> ValidationResult {
    let mut result = ValidationResult {
        diagnostics: Vec::new(),
        config_path,
    };
    let discord = &config.discord;

    if !discord.has_token() {
        result.push(
            Severity::Error,
            "discord.token",
            "no bot token provided (set TOKEN or discord.token)",
        );
    }

    match discord.guild_id.as_deref() {
        None => result.push(
            Severity::Error,
            "discord.guild_id",
            "no guild id provided (set GUILD_ID or discord.guild_id)",
        ),
        Some(id) if !is_snowflake(id) => result.push(
            Severity::Error,
            "discord.guild_id",
            format!("'{id}' is not a valid Discord id"),
        ),
        Some(_) => {},
    }

    match discord.application_id.as_deref() {
        None => result.push(
            Severity::Info,
            "discord.application_id",
            "not set; the application id will be learned from the gateway",
        ),
        Some(id) if !is_snowflake(id) => result.push(
            Severity::Error,
            "discord.application_id",
            format!("'{id}' is not a valid Discord id"),
        ),
        Some(_) => {},
    }

    if discord.message_cache_size == 0 {
        result.push(
            Severity::Warning,
            "discord.message_cache_size",
            "message cache disabled; edits of synced messages will not be propagated",
        );
    }

    if config.sync.operation_timeout_secs == 0 {
        result.push(
            Severity::Warning,
            "sync.operation_timeout_secs",
            "0 is treated as 1 second",
        );
    } else if config.sync.operation_timeout_secs > 120 {
        result.push(
            Severity::Warning,
            "sync.operation_timeout_secs",
            "timeouts above 120s hold stalled deliveries for a long time",
        );
    }

    if config.metrics.enabled && config.metrics.listen.parse::<SocketAddr>().is_err() {
        result.push(
            Severity::Error,
            "metrics.listen",
            format!("'{}' is not a socket address", config.metrics.listen),
        );
    }

    if config.sync.dedupe_recipients {
        result.push(
            Severity::Info,
            "sync.dedupe_recipients",
            "repeated recipients in one /sync receive a single copy",
        );
    }

    result
}
