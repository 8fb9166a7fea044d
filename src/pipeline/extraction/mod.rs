//! Text and marker extraction collaborators.
//!
//! Both engines are external. This module owns the request/response contract,
//! a plain-text extractor for documents that already are text, and an HTTP
//! client for the marker extraction service.

pub mod client;
pub mod text_only;
pub mod types;

pub use client::HttpMarkerExtractor;
pub use text_only::PlainTextExtractor;
pub use types::*;

use thiserror::Error;

use crate::error::UploadError;
use crate::models::enums::ErrorKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Session expired")]
    SessionExpired,

    #[error("Marker extraction failed: {0}")]
    Collaborator(String),

    #[error("Malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("Unsupported format for text extraction: {0}")]
    UnsupportedFormat(String),

    #[error("Text encoding error: {0}")]
    Encoding(String),

    #[error("Document contains no extractable text")]
    EmptyText,

    #[error("{0}")]
    Connectivity(UploadError),

    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::Connectivity(e) => e.kind,
            _ => ErrorKind::MarkerExtractionFailed,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

impl From<&ExtractionError> for UploadError {
    fn from(err: &ExtractionError) -> Self {
        match err {
            ExtractionError::Connectivity(e) => e.clone(),
            other => UploadError::new(other.kind(), other.to_string()),
        }
    }
}

impl From<ExtractionError> for UploadError {
    fn from(err: ExtractionError) -> Self {
        UploadError::from(&err)
    }
}
