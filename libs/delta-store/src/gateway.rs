use std::sync::Arc;

use tokio::sync::broadcast;

use bridge_api::{DeltaRecord, EventFilter, NewEvent, Page, StoredEvent};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::store::{EventStore, TimeRange};

/// Capacity of the create-notification channel. Slow subscribers lag and skip.
const NOTIFY_CAPACITY: usize = 1024;

/// Resolvers for the query API. Each call maps to one store operation.
pub struct QueryGateway {
    store: Arc<dyn EventStore>,
    config: StoreConfig,
    /// Broadcast of every created event.
    notify_tx: broadcast::Sender<StoredEvent>,
}

impl std::fmt::Debug for QueryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryGateway")
            .field("config", &self.config)
            .finish()
    }
}

impl QueryGateway {
    pub fn new(store: Arc<dyn EventStore>, config: StoreConfig) -> Self {
        let (notify_tx, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            store,
            config,
            notify_tx,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<StoredEvent>, StoreError> {
        self.store.get(id).await
    }

    pub async fn list_events(
        &self,
        filter: &EventFilter,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<Page<StoredEvent>, StoreError> {
        let limit = self.config.page_limit(limit);
        self.store
            .scan(filter, limit, cursor)
            .await
            .map_err(|e| e.with_context("listEvents"))
    }

    pub async fn query_events_by_topic(
        &self,
        topic: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<Page<StoredEvent>, StoreError> {
        let limit = self.config.page_limit(limit);
        self.store
            .query_topic(topic, TimeRange::new(start_time, end_time), limit, cursor)
            .await
            .map_err(|e| e.with_context("queryEventsByTopic"))
    }

    /// Changes after `last_sync`. Clients pass the returned `started_at` as the
    /// next `last_sync`; changes from its final millisecond may repeat, later
    /// ones are never skipped. A `last_sync` older than the delta-log ttl needs a full
    /// `list_events` instead.
    pub async fn sync_events(
        &self,
        last_sync: Option<i64>,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<Page<DeltaRecord>, StoreError> {
        let limit = self.config.page_limit(limit);
        self.store
            .changes_since(last_sync, limit, cursor)
            .await
            .map_err(|e| e.with_context("syncEvents"))
    }

    pub async fn latest_events(
        &self,
        topic: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Page<StoredEvent>, StoreError> {
        let limit = self.config.page_limit(limit);
        match topic {
            Some(topic) => {
                self.store
                    .query_topic(topic, TimeRange::default(), limit, None)
                    .await
            }
            None => self.store.query_recent(limit, None).await,
        }
    }

    pub async fn create_event(
        &self,
        topic: &str,
        key: Option<String>,
        data: serde_json::Value,
    ) -> Result<StoredEvent, StoreError> {
        if topic.trim().is_empty() {
            return Err(StoreError::InvalidInput("topic must not be empty".into()));
        }

        let event = self
            .store
            .insert(NewEvent {
                id: uuid::Uuid::new_v4().to_string(),
                topic: topic.to_string(),
                key,
                data,
                // Event time and change time come from the same store write.
                timestamp: None,
                processed_at: None,
            })
            .await?;

        // Err only means nobody is subscribed.
        let receivers = self.notify_tx.send(event.clone()).unwrap_or(0);
        tracing::debug!(id = %event.id, topic = %event.topic, receivers, "event created");
        Ok(event)
    }

    /// Subscribe to create notifications, optionally for a single topic.
    pub fn subscribe(&self, topic: Option<String>) -> EventSubscription {
        EventSubscription {
            rx: self.notify_tx.subscribe(),
            topic,
        }
    }
}

/// Create-notification stream filtered by topic.
pub struct EventSubscription {
    rx: broadcast::Receiver<StoredEvent>,
    topic: Option<String>,
}

impl EventSubscription {
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Next matching event; `None` once the gateway is gone.
    pub async fn recv(&mut self) -> Option<StoredEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    if self.topic.as_ref().is_none_or(|t| *t == event.topic) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, topic = ?self.topic, "subscriber lagged, skipping notifications");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
