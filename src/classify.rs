//! Error Classifier
//!
//! Maps a request failure onto a small taxonomy and decides whether a
//! repeated attempt may succeed.

use serde::Serialize;

use crate::error::RequestError;

// == Error Kind ==
/// Failure category presented to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    AuthenticationRequired,
    AccessDenied,
    NotFound,
    Transient,
    Unknown,
}

impl ErrorKind {
    /// Message suitable for direct display.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::AuthenticationRequired => "Your session has expired. Please sign in again.",
            ErrorKind::AccessDenied => "You do not have permission to perform this action.",
            ErrorKind::NotFound => "The requested resource does not exist.",
            ErrorKind::Transient => "The service is temporarily unavailable. Please try again.",
            ErrorKind::Unknown => "Something went wrong. Please try again later.",
        }
    }
}

// == Classification ==
/// Result of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub user_message: &'static str,
}

impl Classification {
    fn new(kind: ErrorKind, retryable: bool) -> Self {
        Self {
            kind,
            retryable,
            user_message: kind.user_message(),
        }
    }
}

// == Classify ==
/// Classifies a backend status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        401 => Classification::new(ErrorKind::AuthenticationRequired, false),
        403 => Classification::new(ErrorKind::AccessDenied, false),
        404 => Classification::new(ErrorKind::NotFound, false),
        408 | 429 | 500 | 503 => Classification::new(ErrorKind::Transient, true),
        _ => Classification::new(ErrorKind::Unknown, false),
    }
}

/// Classifies any request failure.
///
/// Transport failures keep the retryable mark the transport gave them.
/// Queue overflow and deadline expiry are transient from the caller's
/// point of view: a later manual retry may well succeed.
pub fn classify(error: &RequestError) -> Classification {
    match error {
        RequestError::Status { status, .. } => classify_status(*status),
        RequestError::Transport { retryable, .. } => {
            Classification::new(ErrorKind::Unknown, *retryable)
        }
        RequestError::QueueFull { .. } | RequestError::DeadlineExceeded(_) => {
            Classification::new(ErrorKind::Transient, true)
        }
        RequestError::Cancelled | RequestError::Abandoned(_) => {
            Classification::new(ErrorKind::Unknown, false)
        }
    }
}
