//! Group persistence: one save call per date group, with partial-failure
//! accounting across a pass.

pub mod http_saver;
pub mod orchestrator;
pub mod sqlite_saver;
pub mod types;

pub use http_saver::HttpGroupSaver;
pub use orchestrator::SaveOrchestrator;
pub use sqlite_saver::SqliteGroupSaver;
pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::UploadError;

#[derive(Error, Debug)]
pub enum SaveError {
    #[error("{0}")]
    Transport(UploadError),

    #[error("Session expired")]
    SessionExpired,

    #[error("Group rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed persistence response: {0}")]
    MalformedResponse(String),

    #[error("Invalid group date: {0}")]
    InvalidDate(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Save cancelled")]
    Cancelled,
}
