//! Lab report processing: upload → text → markers → date groups.
//!
//! Collaborators are injected as traits so the whole flow runs against
//! mocks in tests. Saving is a separate step (`SaveOrchestrator`) that
//! happens after review.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::UploadError;
use crate::models::enums::ErrorKind;
use crate::models::{SourceFile, TrackedFile};
use crate::pipeline::extraction::{ExtractionError, MarkerExtractor, TextExtractor};
use crate::pipeline::reconcile::{self, ReviewSession};
use crate::pipeline::upload::{ChunkTransport, UploadEngine};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
}

impl ProcessingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Upload(e) => e.kind,
            Self::Extraction(e) => e.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Extraction stage summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub text_length: usize,
    pub markers: usize,
    pub raw_date_groups: usize,
    pub reported_multiple_dates: bool,
}

pub struct ProcessingOutput {
    pub file: TrackedFile,
    pub extraction: ExtractionSummary,
    pub session: ReviewSession,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct LabReportProcessor<T: ChunkTransport> {
    engine: Arc<UploadEngine<T>>,
    text_extractor: Box<dyn TextExtractor>,
    marker_extractor: Box<dyn MarkerExtractor>,
    fixed_today: Option<NaiveDate>,
}

impl<T: ChunkTransport> LabReportProcessor<T> {
    pub fn new(
        engine: Arc<UploadEngine<T>>,
        text_extractor: Box<dyn TextExtractor>,
        marker_extractor: Box<dyn MarkerExtractor>,
    ) -> Self {
        Self {
            engine,
            text_extractor,
            marker_extractor,
            fixed_today: None,
        }
    }

    /// Pin "today" for date fallbacks.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn engine(&self) -> &Arc<UploadEngine<T>> {
        &self.engine
    }

    /// Upload `file`, extract its markers and reconcile them into a review
    /// session. `date_hint` dates single-visit reports.
    ///
    /// Extraction failures leave the tracked file in `error`.
    pub async fn process(
        &self,
        file: SourceFile,
        date_hint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ProcessingOutput, ProcessingError> {
        let uploaded = self.engine.upload(file.clone()).await?;
        let id = uploaded.id;
        self.engine.begin_processing(id)?;

        let (extraction, text_length) = match self.extract(&file, cancel).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(file_id = %id, error = %e, "Marker extraction failed");
                self.engine.finish_processing(id, Err(&UploadError::from(&e)));
                return Err(e.into());
            }
        };

        let reconciliation = match self.fixed_today {
            Some(today) => reconcile::reconcile(&extraction, date_hint, today),
            None => reconcile::reconcile_today(&extraction, date_hint),
        };
        for warning in &reconciliation.warnings {
            tracing::warn!(file_id = %id, ?warning, "Reconciliation warning");
        }

        self.engine.finish_processing(id, Ok(()));
        let file = self.engine.file(id).unwrap_or(uploaded);

        tracing::info!(
            file_id = %id,
            groups = reconciliation.groups.len(),
            multiple_dates = reconciliation.has_multiple_dates,
            "Lab report ready for review"
        );

        Ok(ProcessingOutput {
            file,
            extraction: ExtractionSummary {
                text_length,
                markers: extraction.markers.len(),
                raw_date_groups: extraction.date_groups.len(),
                reported_multiple_dates: extraction.reported_multiple_dates,
            },
            session: ReviewSession::new(reconciliation),
        })
    }

    async fn extract(
        &self,
        file: &SourceFile,
        cancel: &CancellationToken,
    ) -> Result<(crate::pipeline::extraction::MarkerExtraction, usize), ExtractionError> {
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled);
        }
        let text = self.text_extractor.extract_text(file).await?;
        let extraction = self.marker_extractor.extract_markers(&text, cancel).await?;
        Ok((extraction, text.len()))
    }
}
