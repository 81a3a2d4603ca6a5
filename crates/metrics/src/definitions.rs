//! Metric name and label definitions.
//!
//! Every metric emitted by msgsync is named here so the set of exported
//! series is documented in one place.

/// Fan-out and edit propagation metrics
pub mod sync {
    /// Total number of `dispatch` invocations
    pub const DISPATCHES_TOTAL: &str = "msgsync_dispatches_total";
    /// Per-recipient delivery outcomes, labelled by `status`
    pub const DELIVERIES_TOTAL: &str = "msgsync_deliveries_total";
    /// Per-copy edit outcomes, labelled by `status`
    pub const EDITS_TOTAL: &str = "msgsync_edits_total";
    /// Number of sync records currently held in memory
    pub const RECORDS: &str = "msgsync_records";
}

/// Private-message relay metrics
pub mod relay {
    /// Inbound private messages forwarded to the relay channel
    pub const FORWARDED_TOTAL: &str = "msgsync_relay_forwarded_total";
    /// Inbound private messages dropped, labelled by `reason`
    pub const DROPPED_TOTAL: &str = "msgsync_relay_dropped_total";
}

/// Common label values
pub mod labels {
    pub const DELIVERED: &str = "delivered";
    pub const NOT_FOUND: &str = "not_found";
    pub const FAILED: &str = "failed";
    pub const TIMED_OUT: &str = "timed_out";
    pub const UPDATED: &str = "updated";
    pub const NO_TARGET: &str = "no_target";
    pub const TARGET_UNRESOLVED: &str = "target_unresolved";
}
