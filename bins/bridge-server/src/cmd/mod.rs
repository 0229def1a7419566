pub mod relay;
pub mod serve;

use std::sync::Arc;

use bridge_relay::{PublishClient, RelayHandler, build_decoder};
use delta_store::EventStore;

use crate::config::BridgeConfig;
use crate::error::ServerError;

/// Relay pipeline described by `[relay]`, archiving into `store` when enabled.
pub(crate) fn build_relay(
    config: &BridgeConfig,
    store: Arc<dyn EventStore>,
) -> Result<RelayHandler, ServerError> {
    let decoder = build_decoder(config.relay.registry.as_ref())?;
    let publisher = Arc::new(PublishClient::from_config(&config.relay)?);

    let mut relay = RelayHandler::new(decoder, publisher);
    if config.relay.archive {
        relay = relay.with_archive(store);
    }
    Ok(relay)
}
