use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FileStatus;
use crate::error::UploadError;

/// A file as the caller hands it to the upload engine.
///
/// Bytes are shared (`Arc<[u8]>`) so retries and chunk slicing never copy
/// the whole document.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub media_type: String,
    pub data: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: Arc::from(data),
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(name, media_type, data))
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Engine-owned record of one file moving through the upload path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFile {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub media_type: String,
    /// 0–100
    pub progress: u8,
    pub status: FileStatus,
    pub error: Option<String>,
}

impl TrackedFile {
    pub(crate) fn pending(source: &SourceFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: source.name.clone(),
            size: source.size(),
            media_type: source.media_type.clone(),
            progress: 0,
            status: FileStatus::Pending,
            error: None,
        }
    }
}

/// One byte range of a file. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub file_id: Uuid,
    pub index: usize,
    pub total_chunks: usize,
    pub offset: u64,
    pub len: u64,
    pub is_last: bool,
}

impl Chunk {
    /// Borrow this chunk's bytes out of the whole file.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let start = self.offset as usize;
        let end = start + self.len as usize;
        &data[start..end]
    }
}

/// Byte-level progress for a file while it uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    pub percentage: u8,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            100
        } else {
            ((loaded as f64 / total as f64) * 100.0).round().min(100.0) as u8
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// State transitions and progress published by the upload engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UploadEvent {
    Registered {
        file_id: Uuid,
        name: String,
    },
    StatusChanged {
        file_id: Uuid,
        status: FileStatus,
        error: Option<String>,
    },
    Progress {
        file_id: Uuid,
        progress: UploadProgress,
    },
    ChunkRetry {
        file_id: Uuid,
        chunk_index: usize,
        attempt: u32,
        delay_ms: u64,
    },
}

/// Outcome of pre-flight validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }

    pub fn into_result(self) -> Result<(), UploadError> {
        match self.reason {
            Some(reason) if !self.valid => Err(UploadError::validation(reason)),
            _ => Ok(()),
        }
    }
}
