use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use delta_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cursor = ApiError::from(StoreError::InvalidCursor("x".into()));
        assert_eq!(cursor.status(), StatusCode::BAD_REQUEST);

        let input = ApiError::from(StoreError::InvalidInput("x".into()));
        assert_eq!(input.status(), StatusCode::BAD_REQUEST);

        let backend = ApiError::from(StoreError::Backend("down".into()));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(ApiError::NotFound("event 1".into()).status(), StatusCode::NOT_FOUND);
    }
}
