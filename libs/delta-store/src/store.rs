use std::future::Future;
use std::pin::Pin;

use bridge_api::{DeltaRecord, EventFilter, NewEvent, Page, StoredEvent};

use crate::error::StoreError;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Inclusive timestamp bounds for indexed range reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl TimeRange {
    pub fn new(start: Option<i64>, end: Option<i64>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start.is_none_or(|s| ts >= s) && self.end.is_none_or(|e| ts <= e)
    }
}

/// Versioned base table + companion delta log.
///
/// Every method is one atomic operation against the backing store. Writes
/// produce their delta-log entry inside the store; callers never dual-write.
/// Expired items are never returned, whether or not they were reclaimed yet.
pub trait EventStore: Send + Sync {
    /// Point lookup. Absence is `Ok(None)`.
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<StoredEvent>>;

    /// Create-only write. Fails with `Conflict` if the id exists.
    fn insert(&self, event: NewEvent) -> StoreFuture<'_, StoredEvent>;

    /// Upsert: new ids start at version 1, existing ids get the next version.
    fn put(&self, event: NewEvent) -> StoreFuture<'_, StoredEvent>;

    /// Unindexed scan in key order, filtered by `filter`.
    fn scan<'a>(
        &'a self,
        filter: &'a EventFilter,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>>;

    /// Indexed (topic, timestamp) read, newest first.
    fn query_topic<'a>(
        &'a self,
        topic: &'a str,
        range: TimeRange,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>>;

    /// Newest items across all topics.
    fn query_recent<'a>(
        &'a self,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>>;

    /// Delta-log entries changed strictly after `last_sync` (all when `None`).
    fn changes_since<'a>(
        &'a self,
        last_sync: Option<i64>,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<DeltaRecord>>;

    /// Reclaim expired items and deltas. Returns the number removed.
    fn purge_expired(&self) -> StoreFuture<'_, usize>;
}
