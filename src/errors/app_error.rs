//! HTTP-facing error type.
//!
//! Handlers return [`AppResult`]; failures become a JSON body of the form
//! `{"error": "..."}` with a status code chosen by variant.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::call::CallError;
use crate::utils::PhoneValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A call to the telephony platform or speech service failed
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, "Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<CallError> for AppError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::InvalidInput(msg) => Self::BadRequest(msg),
            CallError::NotFound(id) => Self::NotFound(format!("Call not found: {id}")),
            CallError::Telephony(e) => Self::Upstream(e.to_string()),
            CallError::Speech(e) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<PhoneValidationError> for AppError {
    fn from(err: PhoneValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
