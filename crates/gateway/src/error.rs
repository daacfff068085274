use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("camera {0} has no registered stream source")]
    StreamSourceNotFound(u32),
    #[error("{0}")]
    UploadValidation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::StreamSourceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UploadValidation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(error) => {
                tracing::error!(%error, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
