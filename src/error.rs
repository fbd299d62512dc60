//! Error types for the request orchestrator
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::classify::{classify, ErrorKind};

// == Request Error Enum ==
/// Failure of one execution request.
///
/// `Clone` because a single settled result is fanned out to every caller
/// attached to the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Backend answered with a non-success status
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The call never produced a status (connect failure, reset, decode error)
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// The caller's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,

    /// The per-request deadline elapsed before the request settled
    #[error("Deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// The admission queue was full and the overflow policy dropped this request
    #[error("Request queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The operation panicked or its executor went away before settling
    #[error("Request abandoned: {0}")]
    Abandoned(String),
}

impl RequestError {
    /// Shorthand for a status failure.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        RequestError::Status {
            status,
            message: message.into(),
        }
    }

    /// Shorthand for a transport failure.
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        RequestError::Transport {
            message: message.into(),
            retryable,
        }
    }

    /// Status code carried by the error, if the backend produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let classification = classify(&self);

        let status = match (&self, classification.kind) {
            (RequestError::Status { status, .. }, _) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            (RequestError::Transport { .. }, _) => StatusCode::BAD_GATEWAY,
            (RequestError::DeadlineExceeded(_), _) => StatusCode::GATEWAY_TIMEOUT,
            (_, ErrorKind::Transient) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": classification.user_message,
            "detail": self.to_string(),
            "kind": classification.kind,
            "retryable": classification.retryable,
        }));

        (status, body).into_response()
    }
}

// == Config Error Enum ==
/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric option fell outside its accepted range
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    /// An option could not be parsed
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

// == Gateway Error Enum ==
/// Failures surfaced by the gateway's HTTP handlers.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The orchestrated backend request failed
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The incoming request was malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The incoming method cannot be forwarded
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::Request(err) => return err.clone().into_response(),
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for orchestrated requests.
pub type Result<T> = std::result::Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_only_for_status_errors() {
        assert_eq!(RequestError::status(404, "missing").status_code(), Some(404));
        assert_eq!(RequestError::transport("reset", true).status_code(), None);
        assert_eq!(RequestError::Cancelled.status_code(), None);
    }

    #[test]
    fn test_display_messages() {
        let err = RequestError::status(503, "upstream down");
        assert_eq!(err.to_string(), "Request failed with status 503: upstream down");

        let err = RequestError::QueueFull { capacity: 8 };
        assert_eq!(err.to_string(), "Request queue full (capacity 8)");
    }

    #[test]
    fn test_into_response_preserves_backend_status() {
        let response = RequestError::status(403, "nope").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = RequestError::transport("connection refused", true).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_into_response_maps_scheduler_failures() {
        let response = RequestError::QueueFull { capacity: 1 }.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = RequestError::DeadlineExceeded(Duration::from_secs(5)).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = RequestError::Cancelled.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_error_status() {
        let response = GatewayError::InvalidRequest("bad body".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = GatewayError::UnsupportedMethod("TRACE".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let response = GatewayError::from(RequestError::status(404, "gone")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::OutOfRange {
            name: "CONCURRENCY_LIMIT",
            value: 0,
            min: 1,
            max: 1024,
        };
        assert_eq!(
            err.to_string(),
            "CONCURRENCY_LIMIT must be between 1 and 1024, got 0"
        );
    }
}
