use async_trait::async_trait;

use crate::{
    Result,
    types::{
        ChannelHandle, ConversationHandle, DeliveredCopy, Destination, OriginMessage,
        OutboundMessage, SearchScope,
    },
};

/// Look up users, channels, and messages on a messaging platform.
///
/// `Ok(None)` means "not found". `Err` is reserved for transport failures;
/// callers in the sync engine treat both the same way and skip the item.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// Open (or reuse) the direct-message conversation with a user.
    async fn resolve_private_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<ConversationHandle>>;

    /// Resolve a shared channel by id.
    async fn resolve_channel(&self, channel_id: &str) -> Result<Option<ChannelHandle>>;

    /// Fetch a message by id within `scope`.
    async fn fetch_message(
        &self,
        message_id: &str,
        scope: &SearchScope,
    ) -> Result<Option<OriginMessage>>;
}

/// Send and edit messages on a messaging platform.
#[async_trait]
pub trait ChannelOutbound: Send + Sync {
    /// Post a new message. Returns the copy as stored by the destination.
    async fn send_message(
        &self,
        target: &Destination,
        message: OutboundMessage,
    ) -> Result<DeliveredCopy>;

    /// Replace the text of a previously sent message.
    async fn edit_message(&self, copy: &DeliveredCopy, new_content: &str) -> Result<()>;
}
