use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bridge_api::{
    Clock, EventEnvelope, LogRecord, NewEvent, RelayBatch, SystemClock, WireRecord, channel_for,
    topic_from_group_key,
};
use delta_store::EventStore;

use crate::decoder::MessageDecoder;
use crate::envelope::build_envelope;
use crate::error::RecordError;
use crate::publish::Publisher;

/// Outcome of one batch. `processed + errors` equals the number of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySummary {
    pub processed: usize,
    pub errors: usize,
    /// Envelopes written to the archive store.
    pub saved: usize,
}

/// Drives decode → envelope → publish for every record of a batch.
///
/// Groups and records are handled sequentially. A failing record is counted
/// and logged; it never stops the batch.
pub struct RelayHandler {
    decoder: Arc<dyn MessageDecoder>,
    publisher: Arc<dyn Publisher>,
    archive: Option<Arc<dyn EventStore>>,
    clock: Arc<dyn Clock>,
}

impl RelayHandler {
    pub fn new(decoder: Arc<dyn MessageDecoder>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            decoder,
            publisher,
            archive: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Also write every built envelope to `store`.
    pub fn with_archive(mut self, store: Arc<dyn EventStore>) -> Self {
        self.archive = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn handle(&self, batch: &RelayBatch) -> RelaySummary {
        tracing::info!(records = batch.len(), groups = batch.records.len(), "relaying batch");

        let mut summary = RelaySummary::default();
        let mut built = Vec::new();

        for (group_key, records) in &batch.records {
            let topic = topic_from_group_key(group_key);
            let channel = channel_for(topic);

            for wire in records {
                match self.relay_record(topic, &channel, wire, &mut built).await {
                    Ok(()) => summary.processed += 1,
                    Err(e) => {
                        summary.errors += 1;
                        tracing::warn!(
                            topic = %topic,
                            partition = wire.partition,
                            offset = wire.offset,
                            error = %e,
                            "record failed"
                        );
                    }
                }
            }
        }

        summary.saved = self.save(built).await;

        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            saved = summary.saved,
            "batch complete"
        );
        summary
    }

    async fn relay_record(
        &self,
        topic: &str,
        channel: &str,
        wire: &WireRecord,
        built: &mut Vec<EventEnvelope>,
    ) -> Result<(), RecordError> {
        let record = LogRecord::from_wire(topic, wire)?;
        let decoded = self.decoder.decode(topic, &record.value).await;
        let envelope = build_envelope(
            &record,
            decoded.message,
            decoded.registry_used,
            self.clock.now_utc(),
        );

        let published = self.publisher.publish(channel, &envelope).await;
        if self.archive.is_some() {
            built.push(envelope);
        }
        published.map_err(RecordError::from)
    }

    /// Archive after the publish pass. Failures only lower the `saved` count.
    async fn save(&self, envelopes: Vec<EventEnvelope>) -> usize {
        let Some(store) = &self.archive else {
            return 0;
        };

        let mut saved = 0;
        for envelope in envelopes {
            let id = envelope.archive_id();
            let event = NewEvent {
                id: id.clone(),
                topic: envelope.topic,
                key: envelope.key,
                data: envelope.data.to_value(),
                timestamp: Some(envelope.timestamp),
                processed_at: Some(envelope.processed_at),
            };
            match store.put(event).await {
                Ok(_) => saved += 1,
                Err(e) => tracing::error!(id = %id, error = %e, "archive write failed"),
            }
        }
        saved
    }
}
