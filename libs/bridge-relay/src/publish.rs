use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::Serialize;

use bridge_api::EventEnvelope;

use crate::config::RelayConfig;
use crate::error::PublishError;

pub type PublishFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;

/// Fixed per-request timeout. One attempt, no retry.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one envelope to a channel. Only `Ok` counts as accepted.
pub trait Publisher: Send + Sync {
    fn publish<'a>(&'a self, channel: &'a str, envelope: &'a EventEnvelope) -> PublishFuture<'a>;
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    channel: &'a str,
    /// Each event is itself a JSON document encoded as a string.
    events: [String; 1],
}

/// HTTP client for the pub/sub endpoint: `POST {endpoint}/event`.
pub struct PublishClient {
    http: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl PublishClient {
    pub fn new(endpoint: Option<String>, api_key: Option<String>) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .map_err(|e| PublishError::Client(e.to_string()))?;

        let endpoint = endpoint
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty());
        if endpoint.is_none() {
            tracing::warn!("publish endpoint not configured, every publish will fail");
        }

        Ok(Self {
            http,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self, PublishError> {
        Self::new(config.endpoint.clone(), config.api_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

impl Publisher for PublishClient {
    fn publish<'a>(&'a self, channel: &'a str, envelope: &'a EventEnvelope) -> PublishFuture<'a> {
        Box::pin(async move {
            let Some(endpoint) = self.endpoint.as_deref() else {
                tracing::error!(channel = %channel, offset = envelope.offset, "publish endpoint not configured");
                return Err(PublishError::NotConfigured);
            };

            let body = serde_json::to_vec(&PublishRequest {
                channel,
                events: [serde_json::to_string(envelope)?],
            })?;

            let mut request = self
                .http
                .post(format!("{endpoint}/event"))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }

            let resp = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::error!(channel = %channel, error = %e, "publish transport failure");
                    return Err(PublishError::Transport(e));
                }
            };

            let status = resp.status();
            let text = match resp.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(channel = %channel, status = status.as_u16(), error = %e, "publish response body unreadable");
                    format!("<unreadable body: {e}>")
                }
            };
            if !status.is_success() {
                tracing::error!(channel = %channel, status = status.as_u16(), body = %text, "publish rejected");
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    body: text,
                });
            }

            tracing::debug!(channel = %channel, offset = envelope.offset, response = %text, "published");
            Ok(())
        })
    }
}
