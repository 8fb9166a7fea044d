//! Text-only extraction: documents that already are text.
//!
//! PDFs and images need the external extraction engine; this extractor
//! reports `UnsupportedFormat` for them so the caller can route elsewhere.

use async_trait::async_trait;

use super::types::TextExtractor;
use super::ExtractionError;
use crate::models::SourceFile;

pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, file: &SourceFile) -> Result<String, ExtractionError> {
        let media_type = file.media_type.to_ascii_lowercase();
        if !media_type.starts_with("text/") {
            return Err(ExtractionError::UnsupportedFormat(file.media_type.clone()));
        }

        let text = std::str::from_utf8(&file.data)
            .map_err(|e| ExtractionError::Encoding(e.to_string()))?;
        let text = normalize_text(text);
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }

        tracing::debug!(name = %file.name, chars = text.len(), "Plain text extracted");
        Ok(text)
    }
}

/// Strip a UTF-8 BOM, unify line endings and drop control characters.
fn normalize_text(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}
