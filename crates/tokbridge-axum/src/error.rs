//! HTTP error type for the tokenizer server.
//!
//! Bodies are plain text. Clients surface them verbatim in their error
//! messages, so they carry the decoder or engine message and nothing else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("405 Method Not Allowed")]
    MethodNotAllowed,

    /// Undecodable request or engine failure.
    #[error("{0}")]
    Unprocessable(String),

    /// Response encoding failed or the engine task panicked.
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        } else {
            debug!(status = %status, error = %self, "Request rejected");
        }
        (status, self.to_string()).into_response()
    }
}
