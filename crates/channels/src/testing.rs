//! In-memory fake platform used by tests.
//!
//! Implements both collaborator traits over plain maps and records every
//! outbound call so assertions can inspect what was sent or edited.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    ChannelDirectory, ChannelOutbound, Error, Result,
    types::{
        ChannelHandle, ChannelKind, ConversationHandle, DeliveredCopy, Destination, OriginMessage,
        OutboundMessage, SearchScope,
    },
};

/// A message the fake accepted through `send_message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: String,
    pub destination_id: String,
    pub message: OutboundMessage,
}

#[derive(Default)]
struct State {
    users: HashSet<String>,
    channels: HashMap<String, ChannelHandle>,
    messages: Vec<OriginMessage>,
    sent: Vec<SentMessage>,
    /// Current text of every message the fake holds, keyed by id.
    stored: HashMap<String, String>,
    edit_attempts: Vec<String>,
    failing_sends: HashSet<String>,
    rejecting_sends: HashSet<String>,
    failing_edits: HashSet<String>,
    stalled_sends: HashSet<String>,
    stalled_edits: HashSet<String>,
    broken_directory: bool,
}

/// In-memory stand-in for a messaging platform.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Conversation id the fake assigns to a user's DM.
    #[must_use]
    pub fn dm_id(user_id: &str) -> String {
        format!("dm-{user_id}")
    }

    pub fn add_user(&self, user_id: &str) -> &Self {
        self.state().users.insert(user_id.to_string());
        self
    }

    pub fn add_channel(&self, channel_id: &str, kind: ChannelKind) -> &Self {
        self.state()
            .channels
            .insert(channel_id.to_string(), ChannelHandle {
                id: channel_id.to_string(),
                name: Some(format!("channel-{channel_id}")),
                kind,
            });
        self
    }

    pub fn add_message(&self, message: OriginMessage) -> &Self {
        let mut state = self.state();
        state
            .stored
            .insert(message.id.clone(), message.content.clone());
        state.messages.push(message);
        self
    }

    /// Make every send into `destination_id` fail.
    pub fn fail_sends_to(&self, destination_id: &str) -> &Self {
        self.state().failing_sends.insert(destination_id.to_string());
        self
    }

    /// Make sends into `destination_id` fail as if the target were unreachable,
    /// like a user who does not accept direct messages.
    pub fn reject_sends_to(&self, destination_id: &str) -> &Self {
        self.state()
            .rejecting_sends
            .insert(destination_id.to_string());
        self
    }

    /// Make sends into `destination_id` never complete.
    pub fn stall_sends_to(&self, destination_id: &str) -> &Self {
        self.state().stalled_sends.insert(destination_id.to_string());
        self
    }

    /// Make edits of the message `copy_id` fail.
    pub fn fail_edits_of(&self, copy_id: &str) -> &Self {
        self.state().failing_edits.insert(copy_id.to_string());
        self
    }

    /// Make edits of the message `copy_id` never complete.
    pub fn stall_edits_of(&self, copy_id: &str) -> &Self {
        self.state().stalled_edits.insert(copy_id.to_string());
        self
    }

    /// Make every directory lookup return a transport error.
    pub fn break_directory(&self) -> &Self {
        self.state().broken_directory = true;
        self
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    #[must_use]
    pub fn sent_to(&self, destination_id: &str) -> Vec<SentMessage> {
        self.state()
            .sent
            .iter()
            .filter(|s| s.destination_id == destination_id)
            .cloned()
            .collect()
    }

    /// Current text of a message as the platform sees it.
    #[must_use]
    pub fn stored_content(&self, message_id: &str) -> Option<String> {
        self.state().stored.get(message_id).cloned()
    }

    /// Ids of every message an edit was attempted on, in call order.
    #[must_use]
    pub fn edit_attempts(&self) -> Vec<String> {
        self.state().edit_attempts.clone()
    }
}

#[async_trait]
impl ChannelDirectory for FakePlatform {
    async fn resolve_private_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationHandle>> {
        let state = self.state();
        if state.broken_directory {
            return Err(Error::unavailable("directory offline"));
        }
        Ok(state
            .users
            .contains(user_id)
            .then(|| ConversationHandle {
                id: Self::dm_id(user_id),
                user_id: user_id.to_string(),
            }))
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelHandle>> {
        let state = self.state();
        if state.broken_directory {
            return Err(Error::unavailable("directory offline"));
        }
        Ok(state.channels.get(channel_id).cloned())
    }

    async fn fetch_message(
        &self,
        message_id: &str,
        scope: &SearchScope,
    ) -> Result<Option<OriginMessage>> {
        let state = self.state();
        if state.broken_directory {
            return Err(Error::unavailable("directory offline"));
        }
        Ok(state
            .messages
            .iter()
            .find(|m| {
                m.id == message_id
                    && match scope {
                        SearchScope::AllChannels => true,
                        SearchScope::Channel(id) => &m.channel_id == id,
                    }
            })
            .map(|m| OriginMessage {
                content: state.stored.get(&m.id).cloned().unwrap_or_default(),
                ..m.clone()
            }))
    }
}

#[async_trait]
impl ChannelOutbound for FakePlatform {
    async fn send_message(
        &self,
        target: &Destination,
        message: OutboundMessage,
    ) -> Result<DeliveredCopy> {
        let destination_id = target.id().to_string();
        let stalled = {
            let state = self.state();
            if state.failing_sends.contains(&destination_id) {
                return Err(Error::external(
                    format!("send to {destination_id}"),
                    std::io::Error::other("cannot send messages to this user"),
                ));
            }
            if state.rejecting_sends.contains(&destination_id) {
                return Err(Error::not_found(format!("conversation {destination_id}")));
            }
            state.stalled_sends.contains(&destination_id)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut state = self.state();
        state.stored.insert(id.clone(), message.content.clone());
        let copy = DeliveredCopy::new(&id, &destination_id, &message.content);
        state.sent.push(SentMessage {
            id,
            destination_id,
            message,
        });
        Ok(copy)
    }

    async fn edit_message(&self, copy: &DeliveredCopy, new_content: &str) -> Result<()> {
        let stalled = {
            let mut state = self.state();
            state.edit_attempts.push(copy.id.clone());
            if state.failing_edits.contains(&copy.id) {
                return Err(Error::not_found(format!("message {}", copy.id)));
            }
            state.stalled_edits.contains(&copy.id)
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state();
        match state.stored.get_mut(&copy.id) {
            Some(content) => {
                *content = new_content.to_string();
                Ok(())
            },
            None => Err(Error::not_found(format!("message {}", copy.id))),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let platform = FakePlatform::new();
        platform.add_user("U1");
        assert!(
            platform
                .resolve_private_conversation("U2")
                .await
                .unwrap()
                .is_none()
        );
        let dm = platform
            .resolve_private_conversation("U1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dm.id, "dm-U1");
    }

    #[tokio::test]
    async fn edit_updates_stored_content() {
        let platform = FakePlatform::new();
        let target = Destination::Conversation(ConversationHandle {
            id: "dm-U1".into(),
            user_id: "U1".into(),
        });
        let copy = platform
            .send_message(&target, OutboundMessage::text("hello"))
            .await
            .unwrap();
        platform.edit_message(&copy, "bye").await.unwrap();
        assert_eq!(platform.stored_content(&copy.id).as_deref(), Some("bye"));
    }
}
