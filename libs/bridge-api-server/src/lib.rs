mod error;
mod http;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use bridge_relay::RelayHandler;
use delta_store::QueryGateway;

pub use error::ApiError;

const DEFAULT_WS_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    gateway: Arc<QueryGateway>,
    relay: Arc<RelayHandler>,
    ws_buffer: usize,
}

impl AppState {
    pub fn new(gateway: Arc<QueryGateway>, relay: Arc<RelayHandler>) -> Self {
        Self {
            gateway,
            relay,
            ws_buffer: DEFAULT_WS_BUFFER,
        }
    }

    /// Per-connection queue between subscription tasks and the socket writer.
    pub fn with_ws_buffer(mut self, ws_buffer: usize) -> Self {
        self.ws_buffer = ws_buffer.max(1);
        self
    }
}

/// REST + WebSocket routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/events", get(http::handle_list_events).post(http::handle_create_event))
        .route("/api/events/{id}", get(http::handle_get_event))
        .route("/api/topics/{topic}/events", get(http::handle_query_topic))
        .route("/api/sync", get(http::handle_sync))
        .route("/api/latest", get(http::handle_latest))
        .route("/api/relay", post(http::handle_relay))
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
}

/// Serve on `0.0.0.0:{port}` until `shutdown` fires.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "api server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
