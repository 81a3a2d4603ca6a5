//! Platform-agnostic message and conversation types.
//!
//! Identifiers are opaque strings; each transport decides how to map them onto
//! its own id space.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    /// Bots, webhooks, and system messages.
    pub is_bot: bool,
}

/// A file attached to a message, carried by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// A message that can be synced to private conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginMessage {
    pub id: String,
    pub content: String,
    pub author: Author,
    /// Channel or conversation the message was posted in.
    pub channel_id: String,
}

/// A private (direct-message) conversation with one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationHandle {
    pub id: String,
    pub user_id: String,
}

/// Broad classification of a shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Plain text channel that accepts messages.
    Text,
    /// Direct-message conversation.
    Private,
    /// Voice, category, forum, thread, or anything else.
    Other,
}

/// A shared channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub id: String,
    pub name: Option<String>,
    pub kind: ChannelKind,
}

impl ChannelHandle {
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.kind == ChannelKind::Text
    }

    /// Mention markup for this channel, e.g. `<#123>`.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Where an outbound message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Conversation(ConversationHandle),
    Channel(ChannelHandle),
}

impl Destination {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Conversation(c) => &c.id,
            Self::Channel(c) => &c.id,
        }
    }
}

/// Message body handed to [`ChannelOutbound::send_message`](crate::ChannelOutbound::send_message).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
    /// Message id in the destination to reply to.
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

/// One outbound copy of a message, as stored by the destination.
///
/// The text is a mirror of what was last written to the destination. It is
/// kept behind a lock so holders of a shared copy observe later edits.
#[derive(Debug)]
pub struct DeliveredCopy {
    pub id: String,
    /// Conversation or channel the copy lives in.
    pub conversation_id: String,
    content: RwLock<String>,
}

/// Shared handle to a delivered copy.
pub type SharedCopy = Arc<DeliveredCopy>;

impl DeliveredCopy {
    pub fn new(
        id: impl Into<String>,
        conversation_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: conversation_id.into(),
            content: RwLock::new(content.into()),
        }
    }

    #[must_use]
    pub fn content(&self) -> String {
        self.content
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Update the mirrored text after the destination accepted an edit.
    pub fn set_content(&self, content: impl Into<String>) {
        *self.content.write().unwrap_or_else(|e| e.into_inner()) = content.into();
    }
}

impl Clone for DeliveredCopy {
    fn clone(&self) -> Self {
        Self::new(self.id.clone(), self.conversation_id.clone(), self.content())
    }
}

impl PartialEq for DeliveredCopy {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.conversation_id == other.conversation_id
            && self.content() == other.content()
    }
}

impl Eq for DeliveredCopy {}

/// Where to look when fetching a message by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Every text channel the bot can currently see.
    AllChannels,
    /// A single known channel.
    Channel(String),
}

/// A message received by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub channel_id: String,
    pub author: Author,
    /// Sent in a direct-message conversation rather than a shared channel.
    pub is_private: bool,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Notification that a message was edited.
///
/// `None` on either side means the transport could not provide that content
/// (uncached old message, partial update payload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEdit {
    pub origin_id: String,
    pub channel_id: String,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_copy_observes_mirror_updates() {
        let copy: SharedCopy = Arc::new(DeliveredCopy::new("c1", "dm1", "hello"));
        let other = Arc::clone(&copy);
        copy.set_content("hello there");
        assert_eq!(other.content(), "hello there");
    }

    #[test]
    fn cloned_copy_is_detached() {
        let copy = DeliveredCopy::new("c1", "dm1", "hello");
        let snapshot = copy.clone();
        copy.set_content("changed");
        assert_eq!(snapshot.content(), "hello");
        assert_ne!(snapshot, copy);
    }

    #[test]
    fn channel_mention_markup() {
        let channel = ChannelHandle {
            id: "42".into(),
            name: Some("general".into()),
            kind: ChannelKind::Text,
        };
        assert_eq!(channel.mention(), "<#42>");
        assert!(channel.is_text());
    }
}
