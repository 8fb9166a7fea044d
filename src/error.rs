//! Upload-path error type and the kind → user message classification.
//!
//! Every fallible operation on the upload path returns
//! `Result<T, UploadError>`. Presentation code never inspects messages;
//! it calls [`user_message`] with the error's [`ErrorKind`].

use serde::Serialize;
use thiserror::Error;

pub use crate::models::enums::ErrorKind;

/// Error attached to a `TrackedFile` or surfaced standalone.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{kind}: {message}")]
pub struct UploadError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl UploadError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UploadFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Offline, message)
    }

    pub fn cancelled() -> Self {
        Self::upload_failed(CANCELLED_MESSAGE)
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == ErrorKind::UploadFailed && self.message == CANCELLED_MESSAGE
    }

    /// Map a reqwest transport failure onto the connectivity kinds.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() {
            Self::offline(format!("Cannot reach server: {err}"))
        } else if err.is_timeout() {
            Self::network("Request timed out")
        } else {
            Self::network(err.to_string())
        }
    }
}

pub const CANCELLED_MESSAGE: &str = "Upload cancelled";

/// User-facing copy for an error kind.
pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ValidationFailed => "This file can't be uploaded. Check its size and type.",
        ErrorKind::UploadFailed => "The upload didn't finish. Try again.",
        ErrorKind::NetworkError => "A network problem interrupted the request. Try again.",
        ErrorKind::Offline => "You appear to be offline. Reconnect and retry.",
        ErrorKind::MarkerExtractionFailed => "We couldn't read lab results from this document.",
        ErrorKind::InvalidDate => "A test date couldn't be read; today's date was used instead.",
        ErrorKind::SessionExpired => "Your session has expired. Sign in again.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_code() {
        let err = UploadError::validation("File exceeds 50 MB limit");
        assert_eq!(err.to_string(), "VALIDATION_FAILED: File exceeds 50 MB limit");
    }

    #[test]
    fn cancellation_is_recognized() {
        assert!(UploadError::cancelled().is_cancellation());
        assert!(!UploadError::upload_failed("status 500").is_cancellation());
    }

    #[test]
    fn every_kind_has_user_copy() {
        for kind in [
            ErrorKind::ValidationFailed,
            ErrorKind::UploadFailed,
            ErrorKind::NetworkError,
            ErrorKind::Offline,
            ErrorKind::MarkerExtractionFailed,
            ErrorKind::InvalidDate,
            ErrorKind::SessionExpired,
        ] {
            assert!(!user_message(kind).is_empty());
        }
    }

    #[test]
    fn serializes_without_empty_details() {
        let json = serde_json::to_value(UploadError::offline("no route")).unwrap();
        assert_eq!(json["kind"], "OFFLINE");
        assert!(json.get("details").is_none());
    }
}
