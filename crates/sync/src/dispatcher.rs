//! Best-effort fan-out of one origin message to many private conversations.

use std::{collections::HashSet, sync::Arc, time::Duration};

use {
    futures::future::join_all,
    tracing::{debug, info, warn},
};

use {
    msgsync_channels::{
        ChannelDirectory, ChannelOutbound, Destination, OriginMessage, OutboundMessage,
    },
    msgsync_config::SyncConfig,
};

#[cfg(feature = "metrics")]
use msgsync_metrics::{counter, labels, sync as sync_metrics};

use crate::registry::{RecordId, SyncRegistry};

/// What happened to one recipient of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered { copy_id: String },
    /// The recipient could not be resolved to a private conversation.
    NotFound,
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub status: DeliveryStatus,
}

impl RecipientOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered { .. })
    }
}

/// Result of one `dispatch` invocation.
///
/// Zero deliveries is still a report, not an error.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub record_id: RecordId,
    pub origin_id: String,
    /// Text that was delivered.
    pub content: String,
    /// One entry per input recipient, in input order.
    pub outcomes: Vec<RecipientOutcome>,
}

impl DispatchReport {
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    #[must_use]
    pub fn delivered_to(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_delivered())
            .map(|o| o.recipient.as_str())
            .collect()
    }
}

/// Sends an origin's text into each recipient's DM and records every copy
/// that went through.
pub struct FanoutDispatcher {
    directory: Arc<dyn ChannelDirectory>,
    outbound: Arc<dyn ChannelOutbound>,
    registry: Arc<dyn SyncRegistry>,
    operation_timeout: Duration,
    dedupe_recipients: bool,
}

impl FanoutDispatcher {
    pub fn new(
        directory: Arc<dyn ChannelDirectory>,
        outbound: Arc<dyn ChannelOutbound>,
        registry: Arc<dyn SyncRegistry>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            directory,
            outbound,
            registry,
            operation_timeout: config.operation_timeout(),
            dedupe_recipients: config.dedupe_recipients,
        }
    }

    pub async fn dispatch(&self, origin: &OriginMessage, recipients: &[String]) -> DispatchReport {
        let record_id = RecordId::new();
        let recipients = if self.dedupe_recipients {
            dedupe(recipients)
        } else {
            recipients.to_vec()
        };

        #[cfg(feature = "metrics")]
        counter!(sync_metrics::DISPATCHES_TOTAL).increment(1);

        let outcomes = join_all(
            recipients
                .into_iter()
                .map(|recipient| self.deliver(record_id, origin, recipient)),
        )
        .await;

        let report = DispatchReport {
            record_id,
            origin_id: origin.id.clone(),
            content: origin.content.clone(),
            outcomes,
        };
        info!(
            origin_id = %origin.id,
            record_id = %record_id,
            delivered = report.delivered(),
            requested = report.outcomes.len(),
            recipients = %report.delivered_to().join(", "),
            "synced message to private conversations"
        );
        report
    }

    async fn deliver(
        &self,
        record_id: RecordId,
        origin: &OriginMessage,
        recipient: String,
    ) -> RecipientOutcome {
        let status = match tokio::time::timeout(
            self.operation_timeout,
            self.resolve_and_send(record_id, origin, &recipient),
        )
        .await
        {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    origin_id = %origin.id,
                    recipient = %recipient,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "delivery timed out"
                );
                DeliveryStatus::TimedOut
            },
        };

        #[cfg(feature = "metrics")]
        counter!(sync_metrics::DELIVERIES_TOTAL, "status" => status_label(&status)).increment(1);

        RecipientOutcome { recipient, status }
    }

    async fn resolve_and_send(
        &self,
        record_id: RecordId,
        origin: &OriginMessage,
        recipient: &str,
    ) -> DeliveryStatus {
        let conversation = match self.directory.resolve_private_conversation(recipient).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                debug!(recipient, "recipient not found, skipping");
                return DeliveryStatus::NotFound;
            },
            Err(e) => {
                debug!(recipient, error = %e, "recipient lookup failed, skipping");
                return DeliveryStatus::NotFound;
            },
        };

        let target = Destination::Conversation(conversation);
        match self
            .outbound
            .send_message(&target, OutboundMessage::text(&origin.content))
            .await
        {
            Ok(copy) => {
                // Record only after the platform accepted the message.
                let copy = self.registry.record(record_id, origin, copy);
                DeliveryStatus::Delivered {
                    copy_id: copy.id.clone(),
                }
            },
            Err(e) if e.is_not_found() => {
                debug!(recipient, error = %e, "recipient unreachable, skipping");
                DeliveryStatus::NotFound
            },
            Err(e) => {
                warn!(
                    origin_id = %origin.id,
                    recipient,
                    error = %e,
                    "failed to deliver synced message"
                );
                DeliveryStatus::Failed {
                    reason: e.to_string(),
                }
            },
        }
    }
}

/// Drop repeated recipients, keeping first-seen order.
fn dedupe(recipients: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    recipients
        .iter()
        .filter(|r| seen.insert(r.as_str()))
        .cloned()
        .collect()
}

#[cfg(feature = "metrics")]
fn status_label(status: &DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Delivered { .. } => labels::DELIVERED,
        DeliveryStatus::NotFound => labels::NOT_FOUND,
        DeliveryStatus::Failed { .. } => labels::FAILED,
        DeliveryStatus::TimedOut => labels::TIMED_OUT,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{registry::InMemorySyncRegistry, test_support::origin},
        msgsync_channels::testing::FakePlatform,
    };

    fn dispatcher(
        platform: &Arc<FakePlatform>,
        registry: &Arc<InMemorySyncRegistry>,
        config: SyncConfig,
    ) -> FanoutDispatcher {
        FanoutDispatcher::new(
            Arc::clone(platform) as Arc<dyn ChannelDirectory>,
            Arc::clone(platform) as Arc<dyn ChannelOutbound>,
            Arc::clone(registry) as Arc<dyn SyncRegistry>,
            &config,
        )
    }

    fn users(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn delivers_one_copy_per_resolved_recipient() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1").add_user("U2").add_user("U3");
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U2", "U3"]))
            .await;

        assert_eq!(report.delivered(), 3);
        assert_eq!(report.content, "hello");
        let copies = registry.copies_for("M1");
        assert_eq!(copies.len(), 3);
        assert!(copies.iter().all(|c| c.content() == "hello"));
        assert_eq!(platform.sent().len(), 3);
    }

    #[tokio::test]
    async fn unresolved_recipients_are_skipped() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1").add_user("U3");
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "ghost", "U3", "nobody"]))
            .await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.outcomes[1].status, DeliveryStatus::NotFound);
        assert_eq!(report.delivered_to(), vec!["U1", "U3"]);
        assert_eq!(registry.copies_for("M1").len(), 2);
    }

    #[tokio::test]
    async fn nothing_resolved_reports_zero_without_record() {
        let platform = Arc::new(FakePlatform::new());
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U2"]))
            .await;

        assert_eq!(report.delivered(), 0);
        assert!(registry.is_empty());
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn directory_errors_count_as_not_found() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1").break_directory();
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher.dispatch(&origin("M1", "hello"), &users(&["U1"])).await;

        assert_eq!(report.outcomes[0].status, DeliveryStatus::NotFound);
    }

    #[tokio::test]
    async fn failed_send_is_not_recorded() {
        let platform = Arc::new(FakePlatform::new());
        platform
            .add_user("U1")
            .add_user("U2")
            .fail_sends_to(&FakePlatform::dm_id("U2"));
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U2"]))
            .await;

        assert_eq!(report.delivered(), 1);
        assert!(matches!(
            report.outcomes[1].status,
            DeliveryStatus::Failed { .. }
        ));
        let copies = registry.copies_for("M1");
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].conversation_id, "dm-U1");
    }

    #[tokio::test]
    async fn unreachable_conversation_counts_as_not_found() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1").add_user("U2");
        platform.reject_sends_to(&FakePlatform::dm_id("U2"));
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U2"]))
            .await;

        assert_eq!(report.outcomes[1].status, DeliveryStatus::NotFound);
        assert_eq!(report.delivered_to(), vec!["U1"]);
        assert_eq!(registry.copies_for("M1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_send_times_out_without_blocking_siblings() {
        let platform = Arc::new(FakePlatform::new());
        platform
            .add_user("U1")
            .add_user("U2")
            .stall_sends_to(&FakePlatform::dm_id("U1"));
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig {
            operation_timeout_secs: 2,
            ..Default::default()
        });

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U2"]))
            .await;

        assert_eq!(report.outcomes[0].status, DeliveryStatus::TimedOut);
        assert!(report.outcomes[1].is_delivered());
        assert_eq!(registry.copies_for("M1").len(), 1);
    }

    #[tokio::test]
    async fn duplicate_recipients_are_delivered_twice_by_default() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1");
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U1", "U1"]))
            .await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(platform.sent_to("dm-U1").len(), 2);
    }

    #[tokio::test]
    async fn dedupe_setting_collapses_duplicates() {
        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1").add_user("U2");
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig {
            dedupe_recipients: true,
            ..Default::default()
        });

        let report = dispatcher
            .dispatch(&origin("M1", "hello"), &users(&["U2", "U1", "U2"]))
            .await;

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.delivered_to(), vec!["U2", "U1"]);
    }

    #[tokio::test]
    async fn repeated_dispatch_creates_independent_records() {
        let platform = Arc::new(FakePlatform::new());
        platform
            .add_user("U1")
            .add_user("U2")
            .add_user("U3")
            .add_user("U4");
        let registry = Arc::new(InMemorySyncRegistry::new());
        let dispatcher = dispatcher(&platform, &registry, SyncConfig::default());
        let m1 = origin("M1", "hello");

        let first = dispatcher.dispatch(&m1, &users(&["U1", "U2"])).await;
        let second = dispatcher.dispatch(&m1, &users(&["U3", "U4"])).await;

        assert_ne!(first.record_id, second.record_id);
        let records = registry.records_for("M1");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.copies.len() == 2));
        assert_eq!(registry.copies_for("M1").len(), 4);
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn delivery_outcomes_are_counted() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        let platform = Arc::new(FakePlatform::new());
        platform.add_user("U1");
        let registry = Arc::new(InMemorySyncRegistry::new());
        dispatcher(&platform, &registry, SyncConfig::default())
            .dispatch(&origin("M1", "hello"), &users(&["U1", "ghost"]))
            .await;

        let rendered = handle.render();
        assert!(rendered.contains("msgsync_dispatches_total 1"), "{rendered}");
        assert!(rendered.contains(r#"msgsync_deliveries_total{status="delivered"} 1"#));
        assert!(rendered.contains(r#"msgsync_deliveries_total{status="not_found"} 1"#));
    }
}
