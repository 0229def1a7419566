#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("relay: {0}")]
    Relay(#[from] bridge_relay::RelayError),

    #[error("publish client: {0}")]
    Publish(#[from] bridge_relay::PublishError),

    #[error("batch file '{path}': {detail}")]
    Batch { path: String, detail: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
