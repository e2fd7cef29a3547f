//! Maps failures to HTTP statuses and `{ "error": ... }` bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domains::contracts::ErrorBody;
use domains::{DomainError, ErrorKind};
use thiserror::Error;
use tracing::error;

pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Malformed request body or parameters.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Domain(err) => match err.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Auth => StatusCode::UNAUTHORIZED,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            // Storage details stay in the logs.
            error!(error = %self, "request failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };
        (status, axum::Json(ErrorBody::new(message))).into_response()
    }
}
