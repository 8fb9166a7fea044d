use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::ExtractionError;
use crate::models::{Measurement, RawDateGroup, SourceFile};

/// Request body for the marker extraction service.
#[derive(Debug, Serialize)]
pub struct MarkerExtractionRequest<'a> {
    pub text: &'a str,
}

/// Response body from the marker extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerExtractionResponse {
    pub success: bool,
    #[serde(default)]
    pub markers: Vec<Measurement>,
    #[serde(default)]
    pub date_groups: Vec<RawDateGroup>,
    #[serde(default)]
    pub has_multiple_dates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Extracted markers, flat and per raw date group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkerExtraction {
    pub markers: Vec<Measurement>,
    pub date_groups: Vec<RawDateGroup>,
    /// What the collaborator claims; the reconciler decides from the group count.
    pub reported_multiple_dates: bool,
}

impl From<MarkerExtractionResponse> for MarkerExtraction {
    fn from(response: MarkerExtractionResponse) -> Self {
        Self {
            markers: response.markers,
            date_groups: response.date_groups,
            reported_multiple_dates: response.has_multiple_dates,
        }
    }
}

/// Converts a stored document into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, file: &SourceFile) -> Result<String, ExtractionError>;
}

/// Converts raw text into measurements plus raw date groups.
#[async_trait]
pub trait MarkerExtractor: Send + Sync {
    async fn extract_markers(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<MarkerExtraction, ExtractionError>;
}
