//! Origin → delivered-copy bookkeeping.
//!
//! Records live for the lifetime of the process and are never evicted. The
//! [`SyncRegistry`] trait keeps callers independent of the storage so a
//! bounded store can replace [`InMemorySyncRegistry`] later.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

use {msgsync_channels::{DeliveredCopy, OriginMessage, SharedCopy}, uuid::Uuid};

#[cfg(feature = "metrics")]
use msgsync_metrics::{gauge, sync as sync_metrics};

/// Identifies one `dispatch` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(Uuid);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One origin message and the copies a single invocation delivered.
#[derive(Debug, Clone)]
pub struct SyncRecord {
    pub id: RecordId,
    pub origin: OriginMessage,
    /// Insertion order.
    pub copies: Vec<SharedCopy>,
}

/// Storage for sync records.
pub trait SyncRegistry: Send + Sync {
    /// Append `copy` to the record `(origin, record_id)`, creating it if absent.
    fn record(&self, record_id: RecordId, origin: &OriginMessage, copy: DeliveredCopy)
    -> SharedCopy;

    /// Every copy recorded under `origin_id`, across invocations, in insertion
    /// order.
    fn copies_for(&self, origin_id: &str) -> Vec<SharedCopy>;

    /// Independent records for `origin_id`, oldest first.
    fn records_for(&self, origin_id: &str) -> Vec<SyncRecord>;

    /// Total number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct OriginEntry {
    records: Vec<SyncRecord>,
    /// Every copy of this origin in the order it was recorded, regardless of record.
    copies: Vec<SharedCopy>,
}

/// Unbounded in-memory registry.
#[derive(Default)]
pub struct InMemorySyncRegistry {
    by_origin: RwLock<HashMap<String, OriginEntry>>,
}

impl InMemorySyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn SyncRegistry> {
        Arc::new(Self::new())
    }
}

impl SyncRegistry for InMemorySyncRegistry {
    fn record(
        &self,
        record_id: RecordId,
        origin: &OriginMessage,
        copy: DeliveredCopy,
    ) -> SharedCopy {
        let copy = Arc::new(copy);
        let mut by_origin = self.by_origin.write().unwrap_or_else(|e| e.into_inner());
        let entry = by_origin.entry(origin.id.clone()).or_default();
        entry.copies.push(Arc::clone(&copy));
        match entry.records.iter_mut().find(|r| r.id == record_id) {
            Some(record) => record.copies.push(Arc::clone(&copy)),
            None => {
                entry.records.push(SyncRecord {
                    id: record_id,
                    origin: origin.clone(),
                    copies: vec![Arc::clone(&copy)],
                });
                #[cfg(feature = "metrics")]
                gauge!(sync_metrics::RECORDS).increment(1.0);
            },
        }
        copy
    }

    fn copies_for(&self, origin_id: &str) -> Vec<SharedCopy> {
        let by_origin = self.by_origin.read().unwrap_or_else(|e| e.into_inner());
        by_origin
            .get(origin_id)
            .map(|entry| entry.copies.clone())
            .unwrap_or_default()
    }

    fn records_for(&self, origin_id: &str) -> Vec<SyncRecord> {
        let by_origin = self.by_origin.read().unwrap_or_else(|e| e.into_inner());
        by_origin
            .get(origin_id)
            .map(|entry| entry.records.clone())
            .unwrap_or_default()
    }

    fn len(&self) -> usize {
        let by_origin = self.by_origin.read().unwrap_or_else(|e| e.into_inner());
        by_origin.values().map(|entry| entry.records.len()).sum()
    }
}
