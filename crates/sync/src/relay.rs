//! Forwarding of inbound private messages into one shared channel.

use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use tracing::{debug, info, warn};

use {
    msgsync_channels::{
        ChannelDirectory, ChannelOutbound, Destination, InboundMessage, OutboundMessage,
    },
    msgsync_config::SyncConfig,
};

#[cfg(feature = "metrics")]
use msgsync_metrics::{counter, labels, relay as relay_metrics};

/// The single channel private messages are forwarded to.
///
/// Unset at startup; each `set` replaces the previous value.
#[derive(Debug, Default)]
pub struct RelayTarget {
    channel_id: RwLock<Option<String>>,
}

impl RelayTarget {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<String> {
        self.channel_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Store a new target, returning the one it replaced.
    pub fn set(&self, channel_id: impl Into<String>) -> Option<String> {
        self.channel_id
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .replace(channel_id.into())
    }

    pub fn clear(&self) -> Option<String> {
        self.channel_id
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

/// A message that was forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub channel_id: String,
    pub message_id: String,
}

/// Forwards private messages to the [`RelayTarget`].
///
/// Forwarded messages are not tracked for edit propagation.
pub struct RelayRouter {
    target: Arc<RelayTarget>,
    directory: Arc<dyn ChannelDirectory>,
    outbound: Arc<dyn ChannelOutbound>,
    operation_timeout: Duration,
}

impl RelayRouter {
    pub fn new(
        target: Arc<RelayTarget>,
        directory: Arc<dyn ChannelDirectory>,
        outbound: Arc<dyn ChannelOutbound>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            target,
            directory,
            outbound,
            operation_timeout: config.operation_timeout(),
        }
    }

    /// Returns `None` whenever nothing was forwarded; none of those cases are
    /// reported to the sender.
    pub async fn relay(&self, message: &InboundMessage) -> Option<RelayOutcome> {
        if message.author.is_bot || !message.is_private {
            return None;
        }

        let Some(channel_id) = self.target.get() else {
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::DROPPED_TOTAL, "reason" => labels::NO_TARGET).increment(1);
            return None;
        };

        match tokio::time::timeout(self.operation_timeout, self.forward(channel_id, message)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    author = %message.author.name,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "forwarding private message timed out"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::DROPPED_TOTAL, "reason" => labels::TIMED_OUT).increment(1);
                None
            },
        }
    }

    async fn forward(&self, channel_id: String, message: &InboundMessage) -> Option<RelayOutcome> {
        let channel = match self.directory.resolve_channel(&channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                debug!(channel_id = %channel_id, "relay channel not found, dropping message");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::DROPPED_TOTAL, "reason" => labels::TARGET_UNRESOLVED)
                    .increment(1);
                return None;
            },
            Err(e) => {
                debug!(
                    channel_id = %channel_id,
                    error = %e,
                    "relay channel lookup failed, dropping message"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::DROPPED_TOTAL, "reason" => labels::TARGET_UNRESOLVED)
                    .increment(1);
                return None;
            },
        };

        let outbound = OutboundMessage::text(&message.content)
            .with_attachments(message.attachments.clone());
        match self
            .outbound
            .send_message(&Destination::Channel(channel), outbound)
            .await
        {
            Ok(sent) => {
                info!(
                    author = %message.author.name,
                    channel_id = %channel_id,
                    attachments = message.attachments.len(),
                    "forwarded private message"
                );
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::FORWARDED_TOTAL).increment(1);
                Some(RelayOutcome {
                    channel_id,
                    message_id: sent.id,
                })
            },
            Err(e) => {
                warn!(channel_id = %channel_id, error = %e, "failed to forward private message");
                #[cfg(feature = "metrics")]
                counter!(relay_metrics::DROPPED_TOTAL, "reason" => labels::FAILED).increment(1);
                None
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        msgsync_channels::{Attachment, Author, ChannelKind, testing::FakePlatform},
    };

    fn router(platform: &Arc<FakePlatform>, target: &Arc<RelayTarget>) -> RelayRouter {
        RelayRouter::new(
            Arc::clone(target),
            Arc::clone(platform) as Arc<dyn ChannelDirectory>,
            Arc::clone(platform) as Arc<dyn ChannelOutbound>,
            &SyncConfig::default(),
        )
    }

    fn dm(content: &str) -> InboundMessage {
        InboundMessage {
            id: "in-1".into(),
            channel_id: "dm-U1".into(),
            author: Author {
                id: "U1".into(),
                name: "alice".into(),
                is_bot: false,
            },
            is_private: true,
            content: content.into(),
            attachments: vec![Attachment {
                name: "cat.png".into(),
                url: "https://cdn.example.com/cat.png".into(),
            }],
        }
    }

    #[test]
    fn target_is_last_write_wins() {
        let target = RelayTarget::new();
        assert_eq!(target.get(), None);
        assert_eq!(target.set("C1"), None);
        assert_eq!(target.set("C2").as_deref(), Some("C1"));
        assert_eq!(target.get().as_deref(), Some("C2"));
        assert_eq!(target.clear().as_deref(), Some("C2"));
        assert_eq!(target.get(), None);
    }

    #[tokio::test]
    async fn unset_target_sends_nothing() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C1", ChannelKind::Text);
        let target = Arc::new(RelayTarget::new());

        assert!(router(&platform, &target).relay(&dm("hi")).await.is_none());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn forwards_content_and_attachments_once() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C1", ChannelKind::Text);
        let target = Arc::new(RelayTarget::new());
        target.set("C1");

        let outcome = router(&platform, &target).relay(&dm("hi")).await.unwrap();

        assert_eq!(outcome.channel_id, "C1");
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].destination_id, "C1");
        assert_eq!(sent[0].message.content, "hi");
        assert_eq!(sent[0].message.attachments, dm("hi").attachments);
    }

    #[tokio::test]
    async fn unresolvable_target_is_silent() {
        let platform = Arc::new(FakePlatform::new());
        let target = Arc::new(RelayTarget::new());
        target.set("gone");

        assert!(router(&platform, &target).relay(&dm("hi")).await.is_none());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn ignores_bots_and_shared_channels() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_channel("C1", ChannelKind::Text);
        let target = Arc::new(RelayTarget::new());
        target.set("C1");
        let router = router(&platform, &target);

        let mut from_bot = dm("beep");
        from_bot.author.is_bot = true;
        let mut in_guild = dm("hello all");
        in_guild.is_private = false;

        assert!(router.relay(&from_bot).await.is_none());
        assert!(router.relay(&in_guild).await.is_none());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn follows_target_changes() {
        let platform = Arc::new(FakePlatform::new());
        platform
            .add_channel("C1", ChannelKind::Text)
            .add_channel("C2", ChannelKind::Text);
        let target = Arc::new(RelayTarget::new());
        let router = router(&platform, &target);

        target.set("C1");
        router.relay(&dm("one")).await.unwrap();
        target.set("C2");
        router.relay(&dm("two")).await.unwrap();

        assert_eq!(platform.sent_to("C1").len(), 1);
        assert_eq!(platform.sent_to("C2")[0].message.content, "two");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_forward_gives_up_after_the_timeout() {
        let platform = Arc::new(FakePlatform::new());
        platform
            .add_channel("C1", ChannelKind::Text)
            .stall_sends_to("C1");
        let target = Arc::new(RelayTarget::new());
        target.set("C1");

        let started = tokio::time::Instant::now();
        assert!(router(&platform, &target).relay(&dm("hi")).await.is_none());
        assert_eq!(started.elapsed(), SyncConfig::default().operation_timeout());
        assert!(platform.sent().is_empty());
    }
}
