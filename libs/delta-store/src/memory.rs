use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use tokio::sync::RwLock;

use bridge_api::{
    Clock, DeltaKind, DeltaRecord, EventFilter, NewEvent, Page, StoredEvent, SystemClock,
};

use crate::config::StoreConfig;
use crate::cursor;
use crate::error::StoreError;
use crate::store::{EventStore, StoreFuture, TimeRange};

/// Ordered (timestamp, id) index key.
type TimeKey = (i64, String);
/// Ordered (changed_at, sequence) delta-log key.
type DeltaKey = (i64, u64);

#[derive(Default)]
struct Tables {
    /// Base table, primary key = id.
    items: BTreeMap<String, StoredEvent>,
    /// Secondary index on (topic, timestamp).
    by_topic: HashMap<String, BTreeSet<TimeKey>>,
    /// Secondary index on timestamp across all topics.
    by_time: BTreeSet<TimeKey>,
    deltas: BTreeMap<DeltaKey, DeltaRecord>,
    next_sequence: u64,
    /// Latest change time handed out. Change times never go below it.
    high_water: i64,
}

impl Tables {
    fn index(&mut self, event: &StoredEvent) {
        let key = (event.timestamp, event.id.clone());
        self.by_topic
            .entry(event.topic.clone())
            .or_default()
            .insert(key.clone());
        self.by_time.insert(key);
    }

    fn unindex(&mut self, event: &StoredEvent) {
        let key = (event.timestamp, event.id.clone());
        if let Some(index) = self.by_topic.get_mut(&event.topic) {
            index.remove(&key);
            if index.is_empty() {
                self.by_topic.remove(&event.topic);
            }
        }
        self.by_time.remove(&key);
    }

    fn write(
        &mut self,
        event: NewEvent,
        now: i64,
        policy: &WritePolicy,
        upsert: bool,
    ) -> Result<StoredEvent, StoreError> {
        // Items past their ttl count as absent even before the sweep reclaims them.
        let prior = self
            .items
            .get(&event.id)
            .filter(|p| p.ttl > now)
            .map(|p| p.version);

        let (version, kind) = match prior {
            Some(_) if !upsert => return Err(StoreError::Conflict(event.id)),
            Some(version) => (version + 1, DeltaKind::Update),
            None => (1, DeltaKind::Create),
        };
        let last_changed_at = self.stamp(now);

        let stored = StoredEvent {
            id: event.id,
            topic: event.topic,
            key: event.key,
            data: event.data,
            timestamp: event.timestamp.unwrap_or(last_changed_at),
            processed_at: event
                .processed_at
                .unwrap_or_else(|| chrono::DateTime::from_timestamp_millis(now).unwrap_or_default()),
            ttl: now.saturating_add(policy.retention_ms),
            version,
            last_changed_at,
            deleted: false,
        };

        if let Some(old) = self.items.insert(stored.id.clone(), stored.clone()) {
            self.unindex(&old);
        }
        self.index(&stored);

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.deltas.insert(
            (last_changed_at, sequence),
            DeltaRecord {
                changed_at: last_changed_at,
                sequence,
                kind,
                event: stored.clone(),
                ttl: now.saturating_add(policy.delta_ttl_ms),
            },
        );

        Ok(stored)
    }

    /// Change time for a write at `now`, monotonic across the whole store.
    fn stamp(&mut self, now: i64) -> i64 {
        self.high_water = self.high_water.max(now);
        self.high_water
    }

    /// Sync anchor for a read at `now`. Any write that lands after the read
    /// holds the lock gets a change time strictly greater than this.
    fn sync_anchor(&self, now: i64) -> i64 {
        now.max(self.high_water).saturating_sub(1)
    }

    fn live(&self, id: &str, now: i64) -> Option<&StoredEvent> {
        self.items.get(id).filter(|e| e.ttl > now)
    }
}

struct WritePolicy {
    retention_ms: i64,
    delta_ttl_ms: i64,
}

/// In-process versioned store with a (topic, timestamp) index and a delta log.
///
/// Every base write appends its delta entry under the same lock, so readers
/// never observe an item without its change record.
pub struct MemoryEventStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
    policy: WritePolicy,
}

impl MemoryEventStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
            policy: WritePolicy {
                retention_ms: duration_ms(config.retention()),
                delta_ttl_ms: duration_ms(config.delta_ttl()),
            },
        }
    }

    /// Number of items held, expired or not.
    pub async fn len(&self) -> usize {
        self.tables.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn duration_ms(d: std::time::Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Collect up to `limit` items; emit a cursor only when more remain.
fn take_page<'a, T, I, F>(mut iter: I, limit: usize, key_of: F) -> (Vec<T>, Option<String>)
where
    T: Clone + 'a,
    I: Iterator<Item = &'a T>,
    F: Fn(&T) -> String,
{
    let limit = limit.max(1);
    let mut items = Vec::with_capacity(limit.min(256));
    for item in iter.by_ref() {
        items.push(item.clone());
        if items.len() == limit {
            break;
        }
    }
    let next = if items.len() == limit && iter.next().is_some() {
        items.last().map(key_of)
    } else {
        None
    };
    (items, next)
}

/// Exclusive upper bound for a newest-first walk over a time index.
fn upper_bound(after: Option<TimeKey>, end: Option<i64>) -> Bound<TimeKey> {
    match (after, end) {
        (Some(key), _) => Bound::Excluded(key),
        (None, Some(end)) => match end.checked_add(1) {
            Some(next) => Bound::Excluded((next, String::new())),
            None => Bound::Unbounded,
        },
        (None, None) => Bound::Unbounded,
    }
}

fn time_cursor(event: &StoredEvent) -> String {
    cursor::encode(&(event.timestamp, &event.id))
}

impl EventStore for MemoryEventStore {
    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<StoredEvent>> {
        Box::pin(async move {
            let now = self.clock.now_ms();
            let tables = self.tables.read().await;
            Ok(tables.live(id, now).cloned())
        })
    }

    fn insert(&self, event: NewEvent) -> StoreFuture<'_, StoredEvent> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let now = self.clock.now_ms();
            tables.write(event, now, &self.policy, false)
        })
    }

    fn put(&self, event: NewEvent) -> StoreFuture<'_, StoredEvent> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let now = self.clock.now_ms();
            tables.write(event, now, &self.policy, true)
        })
    }

    fn scan<'a>(
        &'a self,
        filter: &'a EventFilter,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>> {
        Box::pin(async move {
            let started_at = self.clock.now_ms();
            let after: Option<String> = cursor::decode_opt(cursor)?;
            let lower = match after {
                Some(id) => Bound::Excluded(id),
                None => Bound::Unbounded,
            };

            let tables = self.tables.read().await;
            let iter = tables
                .items
                .range::<String, _>((lower, Bound::Unbounded))
                .map(|(_, e)| e)
                .filter(|e| e.ttl > started_at && filter.matches(e));
            let (items, next_token) = take_page(iter, limit, |e| cursor::encode(&e.id));

            Ok(Page {
                items,
                next_token,
                started_at,
            })
        })
    }

    fn query_topic<'a>(
        &'a self,
        topic: &'a str,
        range: TimeRange,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>> {
        Box::pin(async move {
            let started_at = self.clock.now_ms();
            let after: Option<TimeKey> = cursor::decode_opt(cursor)?;

            let tables = self.tables.read().await;
            let Some(index) = tables.by_topic.get(topic) else {
                return Ok(Page::empty(started_at));
            };

            let iter = index
                .range((Bound::Unbounded, upper_bound(after, range.end)))
                .rev()
                .take_while(|(ts, _)| range.start.is_none_or(|s| *ts >= s))
                .filter(|(ts, _)| range.contains(*ts))
                .filter_map(|(_, id)| tables.live(id, started_at));
            let (items, next_token) = take_page(iter, limit, time_cursor);

            Ok(Page {
                items,
                next_token,
                started_at,
            })
        })
    }

    fn query_recent<'a>(
        &'a self,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<StoredEvent>> {
        Box::pin(async move {
            let started_at = self.clock.now_ms();
            let after: Option<TimeKey> = cursor::decode_opt(cursor)?;

            let tables = self.tables.read().await;
            let iter = tables
                .by_time
                .range((Bound::Unbounded, upper_bound(after, None)))
                .rev()
                .filter_map(|(_, id)| tables.live(id, started_at));
            let (items, next_token) = take_page(iter, limit, time_cursor);

            Ok(Page {
                items,
                next_token,
                started_at,
            })
        })
    }

    fn changes_since<'a>(
        &'a self,
        last_sync: Option<i64>,
        limit: usize,
        cursor: Option<&'a str>,
    ) -> StoreFuture<'a, Page<DeltaRecord>> {
        Box::pin(async move {
            let after: Option<DeltaKey> = cursor::decode_opt(cursor)?;
            let lower = match (after, last_sync) {
                (Some(key), _) => Bound::Excluded(key),
                // Strictly after `last_sync`: skip every sequence at that millisecond.
                (None, Some(t)) if t > 0 => Bound::Excluded((t, u64::MAX)),
                _ => Bound::Unbounded,
            };

            let tables = self.tables.read().await;
            let now = self.clock.now_ms();
            // Changes in the anchor's last millisecond may be delivered twice;
            // later writes are never skipped.
            let started_at = tables.sync_anchor(now);
            let iter = tables
                .deltas
                .range((lower, Bound::Unbounded))
                .map(|(_, d)| d)
                .filter(|d| d.ttl > now);
            let (items, next_token) =
                take_page(iter, limit, |d| cursor::encode(&(d.changed_at, d.sequence)));

            Ok(Page {
                items,
                next_token,
                started_at,
            })
        })
    }

    fn purge_expired(&self) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let now = self.clock.now_ms();
            let mut tables = self.tables.write().await;

            let expired: Vec<String> = tables
                .items
                .values()
                .filter(|e| e.ttl <= now)
                .map(|e| e.id.clone())
                .collect();
            for id in &expired {
                if let Some(old) = tables.items.remove(id) {
                    tables.unindex(&old);
                }
            }

            let deltas_before = tables.deltas.len();
            tables.deltas.retain(|_, d| d.ttl > now);
            let deltas_removed = deltas_before - tables.deltas.len();

            if !expired.is_empty() || deltas_removed > 0 {
                tracing::debug!(
                    items = expired.len(),
                    deltas = deltas_removed,
                    "purged expired entries"
                );
            }
            Ok(expired.len() + deltas_removed)
        })
    }
}
