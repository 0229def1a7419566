#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("item '{0}' already exists")]
    Conflict(String),

    #[error("backend: {0}")]
    Backend(String),
}

impl StoreError {
    /// Add context to the error message, preserving the variant.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            StoreError::InvalidCursor(msg) => StoreError::InvalidCursor(format!("{ctx}: {msg}")),
            StoreError::InvalidInput(msg) => StoreError::InvalidInput(format!("{ctx}: {msg}")),
            StoreError::Backend(msg) => StoreError::Backend(format!("{ctx}: {msg}")),
            other => other,
        }
    }

    /// Errors caused by the caller's request rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidCursor(_) | StoreError::InvalidInput(_) | StoreError::Conflict(_)
        )
    }
}
