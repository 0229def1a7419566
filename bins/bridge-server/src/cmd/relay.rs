use std::sync::Arc;

use bridge_api::RelayBatch;
use delta_store::MemoryEventStore;

use super::build_relay;
use crate::config::RelayArgs;
use crate::error::ServerError;

/// One-shot relay of a batch file. The summary goes to stdout as JSON.
pub async fn run(args: RelayArgs) -> Result<(), ServerError> {
    let config = args.common.load()?;
    let batch = read_batch(&args.batch).await?;
    tracing::info!(batch = %args.batch, records = batch.len(), "loaded batch");

    // Archive target lives only for this run.
    let store = Arc::new(MemoryEventStore::new(&config.store));
    let relay = build_relay(&config, store)?;

    let summary = relay.handle(&batch).await;
    let json = serde_json::to_string(&summary).map_err(|e| ServerError::Batch {
        path: args.batch.clone(),
        detail: format!("serialize summary: {e}"),
    })?;
    println!("{json}");
    Ok(())
}

async fn read_batch(path: &str) -> Result<RelayBatch, ServerError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServerError::Batch {
            path: path.to_string(),
            detail: e.to_string(),
        })?;
    serde_json::from_str(&content).map_err(|e| ServerError::Batch {
        path: path.to_string(),
        detail: e.to_string(),
    })
}
