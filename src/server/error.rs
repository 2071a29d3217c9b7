//! HTTP error mapping

use crate::error::Error;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// JSON error body: `{"detail": "..."}`
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub detail: String,
}

/// An [`Error`] on its way out of a handler
#[derive(Debug)]
pub struct ApiError(pub Error);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self(Error::Validation(msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(Error::Unauthorized(msg.into()))
    }

    /// Status code and client-facing message
    fn status_and_detail(&self) -> (StatusCode, String) {
        match &self.0 {
            Error::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Error::Parse(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Error::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.0.to_string()),
            Error::SessionNotFound(_) => (StatusCode::NOT_FOUND, "Session not found".to_string()),
            Error::DocumentNotFound(_) => {
                (StatusCode::NOT_FOUND, "Document not found".to_string())
            }
            Error::MessageNotFound(_) => (StatusCode::NOT_FOUND, "Message not found".to_string()),
            Error::ReportNotFound(_) => (StatusCode::NOT_FOUND, "Report not found".to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self.0, "Request rejected");
        }

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
