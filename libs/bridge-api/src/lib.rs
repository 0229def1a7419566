pub mod envelope;
pub mod event;
pub mod message;
pub mod record;
pub mod time;

pub use envelope::EventEnvelope;
pub use event::{DeltaKind, DeltaRecord, EventFilter, NewEvent, Page, StoredEvent};
pub use message::{DecodedMessage, StructuredRecord};
pub use record::{LogRecord, RelayBatch, WireRecord, channel_for, topic_from_group_key};
pub use time::{Clock, ManualClock, SystemClock};
