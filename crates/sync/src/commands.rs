//! `/sync` and `/forward` command semantics.
//!
//! Argument interpretation and every user-visible reply live here; the
//! transport binding only extracts option values and posts the reply.

use std::collections::BTreeMap;

use tracing::info;

use msgsync_channels::SearchScope;

use crate::service::SyncService;

pub const SYNC_COMMAND: &str = "sync";
pub const FORWARD_COMMAND: &str = "forward";

pub const NO_USERS: &str = "Couldn't find any users!";
pub const NO_MESSAGE: &str = "Couldn't find that message!";
pub const NO_CHANNEL: &str = "Couldn't find that channel!";
pub const NOT_TEXT_CHANNEL: &str = "That channel isn't a text channel!";

/// A slash command as received from the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    pub name: String,
    pub options: BTreeMap<String, String>,
    /// Id of the user who ran the command.
    pub invoker_id: Option<String>,
}

impl CommandInvocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Reply to show the invoker. Always ephemeral today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub content: String,
    pub ephemeral: bool,
}

impl CommandReply {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

/// Extract user ids from a whitespace-separated list of mentions or raw ids.
///
/// `<@123>`, `<@!123>` and `123` all yield `123`. Duplicates are kept.
#[must_use]
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(|token| token.replace(['<', '@', '!', '>'], ""))
        .filter(|id| !id.is_empty())
        .collect()
}

#[must_use]
pub fn sync_reply_text(delivered: usize, content: &str) -> String {
    format!("Sent message to {delivered} users: ```{content}```")
}

impl SyncService {
    /// Run a slash command and produce the reply for its invoker.
    pub async fn handle_command(&self, invocation: &CommandInvocation) -> CommandReply {
        match invocation.name.as_str() {
            SYNC_COMMAND => self.sync_command(invocation).await,
            FORWARD_COMMAND => self.forward_command(invocation).await,
            other => CommandReply::ephemeral(format!("Unknown command: {other}")),
        }
    }

    async fn sync_command(&self, invocation: &CommandInvocation) -> CommandReply {
        let recipients = parse_recipients(invocation.option("users").unwrap_or_default());
        if recipients.is_empty() {
            return CommandReply::ephemeral(NO_USERS);
        }

        let Some(message_id) = invocation.option("message") else {
            return CommandReply::ephemeral(NO_MESSAGE);
        };
        let origin = match self
            .directory()
            .fetch_message(message_id, &SearchScope::AllChannels)
            .await
        {
            Ok(Some(origin)) => origin,
            Ok(None) | Err(_) => return CommandReply::ephemeral(NO_MESSAGE),
        };

        let report = self.dispatch(&origin, &recipients).await;
        CommandReply::ephemeral(sync_reply_text(report.delivered(), &report.content))
    }

    async fn forward_command(&self, invocation: &CommandInvocation) -> CommandReply {
        let Some(channel_id) = invocation.option("channel") else {
            return CommandReply::ephemeral(NO_CHANNEL);
        };
        let channel = match self.directory().resolve_channel(channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) | Err(_) => return CommandReply::ephemeral(NO_CHANNEL),
        };
        if !channel.is_text() {
            return CommandReply::ephemeral(NOT_TEXT_CHANNEL);
        }

        let previous = self.relay_target().set(&channel.id);
        info!(
            channel_id = %channel.id,
            previous = previous.as_deref().unwrap_or("none"),
            invoker = invocation.invoker_id.as_deref().unwrap_or("unknown"),
            "relay target updated"
        );
        CommandReply::ephemeral(format!("Forwarding messages to {}", channel.mention()))
    }
}
