//! Metric definitions for msgsync.
//!
//! Crates record through the `metrics` facade macros re-exported here; the
//! calls are no-ops until the host process installs a recorder.
//!
//! ```rust,ignore
//! use msgsync_metrics::{counter, sync};
//!
//! counter!(sync::DELIVERIES_TOTAL, "status" => "delivered").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
