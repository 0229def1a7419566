pub mod config;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use gateway::{EventSubscription, QueryGateway};
pub use memory::MemoryEventStore;
pub use store::{EventStore, StoreFuture, TimeRange};
