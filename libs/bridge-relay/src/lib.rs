pub mod config;
pub mod decoder;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod publish;

pub use config::{RegistryConfig, RelayConfig};
pub use decoder::{Decoded, MessageDecoder, PassthroughDecoder, RegistryDecoder, build_decoder};
pub use envelope::build_envelope;
pub use error::{DecodeError, PublishError, RecordError, RelayError};
pub use handler::{RelayHandler, RelaySummary};
pub use publish::{PublishClient, Publisher};
