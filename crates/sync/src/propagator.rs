//! Apply edits of an origin message to every copy delivered from it.

use std::{sync::Arc, time::Duration};

use {
    futures::future::join_all,
    tracing::{debug, info, warn},
};

use {
    msgsync_channels::{
        ChannelHandle, ChannelKind, ChannelOutbound, Destination, MessageEdit, OutboundMessage,
        SharedCopy,
    },
    msgsync_config::SyncConfig,
};

#[cfg(feature = "metrics")]
use msgsync_metrics::{counter, labels, sync as sync_metrics};

use crate::registry::SyncRegistry;

/// What happened to one copy during propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditStatus {
    Updated,
    Failed { reason: String },
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub copy_id: String,
    pub conversation_id: String,
    pub status: EditStatus,
}

/// Result of propagating one edit to at least one copy.
#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub origin_id: String,
    pub content: String,
    pub outcomes: Vec<CopyOutcome>,
}

impl PropagationReport {
    #[must_use]
    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == EditStatus::Updated)
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.updated()
    }
}

/// Confirmation posted under an edited origin.
#[must_use]
pub fn confirmation_text(updated: usize, content: &str) -> String {
    format!("Updated synced message to {updated} users: ```{content}```")
}

/// Rewrites delivered copies when their origin changes.
pub struct EditPropagator {
    registry: Arc<dyn SyncRegistry>,
    outbound: Arc<dyn ChannelOutbound>,
    operation_timeout: Duration,
}

impl EditPropagator {
    pub fn new(
        registry: Arc<dyn SyncRegistry>,
        outbound: Arc<dyn ChannelOutbound>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            registry,
            outbound,
            operation_timeout: config.operation_timeout(),
        }
    }

    /// Returns `None` when there was nothing to do: a partial notification,
    /// unchanged text, or an origin that was never synced.
    pub async fn handle_edit(&self, edit: &MessageEdit) -> Option<PropagationReport> {
        let (Some(old), Some(new)) = (&edit.old_content, &edit.new_content) else {
            debug!(origin_id = %edit.origin_id, "partial edit notification, skipping");
            return None;
        };
        if old == new {
            return None;
        }

        let copies = self.registry.copies_for(&edit.origin_id);
        if copies.is_empty() {
            return None;
        }

        let outcomes = join_all(copies.into_iter().map(|copy| self.update_copy(copy, new))).await;
        let report = PropagationReport {
            origin_id: edit.origin_id.clone(),
            content: new.clone(),
            outcomes,
        };

        info!(
            origin_id = %edit.origin_id,
            updated = report.updated(),
            failed = report.failed(),
            "propagated edit to synced copies"
        );

        self.confirm(edit, &report).await;
        Some(report)
    }

    async fn update_copy(&self, copy: SharedCopy, new_content: &str) -> CopyOutcome {
        let status = match tokio::time::timeout(
            self.operation_timeout,
            self.outbound.edit_message(&copy, new_content),
        )
        .await
        {
            Ok(Ok(())) => {
                copy.set_content(new_content);
                EditStatus::Updated
            },
            Ok(Err(e)) if e.is_not_found() => {
                debug!(
                    copy_id = %copy.id,
                    conversation_id = %copy.conversation_id,
                    "synced copy no longer exists"
                );
                EditStatus::Failed {
                    reason: e.to_string(),
                }
            },
            Ok(Err(e)) => {
                warn!(
                    copy_id = %copy.id,
                    conversation_id = %copy.conversation_id,
                    error = %e,
                    "failed to update synced copy"
                );
                EditStatus::Failed {
                    reason: e.to_string(),
                }
            },
            Err(_) => {
                warn!(
                    copy_id = %copy.id,
                    conversation_id = %copy.conversation_id,
                    "updating synced copy timed out"
                );
                EditStatus::TimedOut
            },
        };

        #[cfg(feature = "metrics")]
        counter!(sync_metrics::EDITS_TOTAL, "status" => match &status {
            EditStatus::Updated => labels::UPDATED,
            EditStatus::Failed { .. } => labels::FAILED,
            EditStatus::TimedOut => labels::TIMED_OUT,
        })
        .increment(1);

        CopyOutcome {
            copy_id: copy.id.clone(),
            conversation_id: copy.conversation_id.clone(),
            status,
        }
    }

    async fn confirm(&self, edit: &MessageEdit, report: &PropagationReport) {
        let home = Destination::Channel(ChannelHandle {
            id: edit.channel_id.clone(),
            name: None,
            kind: ChannelKind::Text,
        });
        let reply = OutboundMessage::text(confirmation_text(report.updated(), &report.content))
            .reply_to(&edit.origin_id);

        match tokio::time::timeout(
            self.operation_timeout,
            self.outbound.send_message(&home, reply),
        )
        .await
        {
            Ok(Ok(_)) => {},
            Ok(Err(e)) => {
                warn!(origin_id = %edit.origin_id, error = %e, "failed to post edit confirmation");
            },
            Err(_) => {
                warn!(origin_id = %edit.origin_id, "posting edit confirmation timed out");
            },
        }
    }
}
