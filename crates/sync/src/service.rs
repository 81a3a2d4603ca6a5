use std::sync::Arc;

use {
    msgsync_channels::{
        ChannelDirectory, ChannelOutbound, InboundMessage, MessageEdit, OriginMessage,
    },
    msgsync_config::SyncConfig,
};

use crate::{
    dispatcher::{DispatchReport, FanoutDispatcher},
    propagator::{EditPropagator, PropagationReport},
    registry::{InMemorySyncRegistry, SyncRegistry},
    relay::{RelayOutcome, RelayRouter, RelayTarget},
};

/// Entry points the transport binding calls into.
///
/// Owns one registry and one relay target for the life of the process.
pub struct SyncService {
    directory: Arc<dyn ChannelDirectory>,
    registry: Arc<dyn SyncRegistry>,
    relay_target: Arc<RelayTarget>,
    dispatcher: FanoutDispatcher,
    propagator: EditPropagator,
    router: RelayRouter,
}

impl SyncService {
    /// Build a service backed by an in-memory registry.
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        outbound: Arc<dyn ChannelOutbound>,
        config: &SyncConfig,
    ) -> Self {
        Self::with_registry(directory, outbound, InMemorySyncRegistry::shared(), config)
    }

    pub fn with_registry(
        directory: Arc<dyn ChannelDirectory>,
        outbound: Arc<dyn ChannelOutbound>,
        registry: Arc<dyn SyncRegistry>,
        config: &SyncConfig,
    ) -> Self {
        let relay_target = Arc::new(RelayTarget::new());
        Self {
            dispatcher: FanoutDispatcher::new(
                Arc::clone(&directory),
                Arc::clone(&outbound),
                Arc::clone(&registry),
                config,
            ),
            propagator: EditPropagator::new(Arc::clone(&registry), Arc::clone(&outbound), config),
            router: RelayRouter::new(
                Arc::clone(&relay_target),
                Arc::clone(&directory),
                outbound,
                config,
            ),
            directory,
            registry,
            relay_target,
        }
    }

    pub async fn dispatch(&self, origin: &OriginMessage, recipients: &[String]) -> DispatchReport {
        self.dispatcher.dispatch(origin, recipients).await
    }

    pub async fn handle_edit(&self, edit: &MessageEdit) -> Option<PropagationReport> {
        self.propagator.handle_edit(edit).await
    }

    pub async fn relay(&self, message: &InboundMessage) -> Option<RelayOutcome> {
        self.router.relay(message).await
    }

    pub fn relay_target(&self) -> &RelayTarget {
        &self.relay_target
    }

    pub fn registry(&self) -> &dyn SyncRegistry {
        self.registry.as_ref()
    }

    pub(crate) fn directory(&self) -> &dyn ChannelDirectory {
        self.directory.as_ref()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{origin, service},
        msgsync_channels::{Attachment, Author, ChannelKind},
    };

    #[tokio::test]
    async fn sync_then_edit_round() {
        let (platform, svc) = service();
        platform.add_user("U1").add_user("U2");

        let report = svc
            .dispatch(&origin("M1", "hello"), &["U1".into(), "U2".into()])
            .await;
        assert_eq!(report.delivered(), 2);
        let copies = svc.registry().copies_for("M1");
        assert_eq!(copies.len(), 2);
        assert!(copies.iter().all(|c| c.content() == "hello"));

        let propagated = svc
            .handle_edit(&MessageEdit {
                origin_id: "M1".into(),
                channel_id: "C1".into(),
                old_content: Some("hello".into()),
                new_content: Some("hello there".into()),
            })
            .await
            .unwrap();
        assert_eq!(propagated.updated(), 2);
        assert!(
            svc.registry()
                .copies_for("M1")
                .iter()
                .all(|c| c.content() == "hello there")
        );
    }

    #[tokio::test]
    async fn relayed_messages_are_not_synced() {
        let (platform, svc) = service();
        platform.add_channel("C1", ChannelKind::Text);
        svc.relay_target().set("C1");

        let outcome = svc
            .relay(&InboundMessage {
                id: "D1".into(),
                channel_id: "dm-U1".into(),
                author: Author {
                    id: "U1".into(),
                    name: "bob".into(),
                    is_bot: false,
                },
                is_private: true,
                content: "ping".into(),
                attachments: vec![Attachment {
                    name: "a.txt".into(),
                    url: "https://cdn.example.com/a.txt".into(),
                }],
            })
            .await;

        assert!(outcome.is_some());
        assert!(svc.registry().is_empty());
        assert!(svc.registry().copies_for("D1").is_empty());
    }
}
