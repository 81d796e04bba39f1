//! Error types for the presence agent HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tracking(#[from] presence_tracker::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tracking session not found: {0}")]
    SessionNotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use presence_tracker::Error;

        let (status, error_type, message) = match &self {
            ApiError::Tracking(e) => {
                let status = match e {
                    Error::InvalidTarget(_) => StatusCode::BAD_REQUEST,
                    Error::TargetNotFound(_) => StatusCode::NOT_FOUND,
                    Error::LocationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    Error::SubscriptionFailed(_) | Error::Store(_) | Error::Decode(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, e.kind(), e.user_message())
            }
            ApiError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, "invalid_request", self.to_string())
            }
            ApiError::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, "session_not_found", self.to_string())
            }
        };

        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
