/// Failure inside one decode strategy. Never leaves the decoder: every
/// strategy falls through to the next one.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid registry header: {0}")]
    Header(String),

    #[error("unsupported compression byte 0x{0:02x}")]
    Compression(u8),

    #[error("inflate: {0}")]
    Inflate(#[from] std::io::Error),

    #[error("inflated body exceeds {0} bytes")]
    InflatedTooLarge(usize),

    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("schema source: {0}")]
    Source(String),

    #[error("avro: {0}")]
    Avro(String),
}

impl DecodeError {
    /// Add context to the error.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            DecodeError::Header(msg) => DecodeError::Header(format!("{ctx}: {msg}")),
            DecodeError::Source(msg) => DecodeError::Source(format!("{ctx}: {msg}")),
            DecodeError::Avro(msg) => DecodeError::Avro(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish endpoint is not configured")]
    NotConfigured,

    #[error("http client: {0}")]
    Client(String),

    #[error("serialize envelope: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Why a single record was not accepted. Counted, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid base64 in record: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("config error: {0}")]
    Config(String),
}
