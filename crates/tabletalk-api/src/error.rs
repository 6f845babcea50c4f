//! API error type and JSON error bodies.
//!
//! Every failure is returned as `{"error": <code>, "message": <text>}` with
//! a matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use tabletalk_chat::ChatError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `"not_found"`.
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - invalid query text or parameters.
    BadRequest(String),
    /// 404 - unknown session.
    NotFound(String),
    /// 409 - the session was torn down while the request was running.
    Conflict(String),
    /// 503 - the dataset could not be loaded.
    ServiceUnavailable(String),
}

impl ApiError {
    fn parts(self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "table_unavailable", msg)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = code, "Request failed");
        }
        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::TableUnavailable(ref load) => ApiError::ServiceUnavailable(format!(
                "dataset unavailable ({}); check the dataset source and try again",
                load.reason()
            )),
            ChatError::Cancelled => ApiError::Conflict("session was closed during the request".to_string()),
        }
    }
}
