use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use bridge_api_server::AppState;
use delta_store::{EventStore, MemoryEventStore, QueryGateway};

use super::build_relay;
use crate::config::ServeArgs;
use crate::error::ServerError;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("bridge-server starting");

    // --- Load config ---
    let config = args.common.load()?;
    tracing::info!(config = %args.common.config, "loaded config");

    let token = CancellationToken::new();

    // --- Store + gateway ---
    let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new(&config.store));
    let gateway = Arc::new(QueryGateway::new(store.clone(), config.store.clone()));
    tracing::info!(
        retention_days = config.store.retention_days,
        delta_ttl_minutes = config.store.delta_ttl_minutes,
        "event store ready"
    );

    // --- Relay ---
    let relay = Arc::new(build_relay(&config, store.clone())?);
    tracing::info!(
        endpoint = config.relay.endpoint.as_deref().unwrap_or("-"),
        registry = config.relay.registry.as_ref().map(|r| r.name.as_str()).unwrap_or("-"),
        archive = config.relay.archive,
        "relay ready"
    );

    let sweep_handle = spawn_sweep(store, config.store.sweep_interval(), token.clone());

    // --- API server (HTTP + WS) ---
    let port = args.port.unwrap_or(config.api_port);
    let state = AppState::new(gateway, relay).with_ws_buffer(config.ws_buffer);
    let mut api_handle = tokio::spawn(bridge_api_server::run(port, state, token.clone()));

    tracing::info!(port, "server ready");

    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down...");
            signal.map_err(ServerError::from)
        }
        served = &mut api_handle => {
            match served {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(ServerError::Io(e)),
                Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
            }
        }
    };

    // Signal all tasks to stop cooperatively, then give them a bounded grace period.
    token.cancel();
    drain("api", api_handle).await;
    drain("sweep", sweep_handle).await;

    tracing::info!("shutdown complete");
    result
}

async fn drain<T>(name: &str, handle: JoinHandle<T>) {
    if handle.is_finished() {
        return;
    }
    let abort = handle.abort_handle();
    if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
        tracing::warn!(task = name, "task did not stop in time, aborting");
        abort.abort();
    }
}

/// Reclaim expired items and deltas every `interval` until cancelled.
fn spawn_sweep(
    store: Arc<dyn EventStore>,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "expired entries purged"),
                    Err(e) => tracing::warn!(error = %e, "ttl sweep failed"),
                },
            }
        }
    })
}
