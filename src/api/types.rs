//! Shared state for the persistence API.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::config::ServerConfig;
use crate::db::{self, DatabaseError};

// ═══════════════════════════════════════════════════════════
// API context
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    db: Arc<Mutex<Connection>>,
    pub staging_dir: PathBuf,
    pub max_chunk_bytes: usize,
}

impl ApiContext {
    pub fn new(conn: Connection, staging_dir: &Path, max_chunk_bytes: usize) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            staging_dir: staging_dir.to_path_buf(),
            max_chunk_bytes,
        }
    }

    /// Open the database named by `config` and build a context around it.
    pub fn open(config: &ServerConfig) -> Result<Self, DatabaseError> {
        let conn = db::open_database(&config.database_path)?;
        Ok(Self::new(conn, &config.staging_dir, config.max_chunk_bytes))
    }

    /// Lock the connection. Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))
    }

    pub fn shared_db(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.db)
    }

    /// Directory holding the received parts of one file.
    pub fn parts_dir(&self, file_name: &str) -> PathBuf {
        self.staging_dir.join("parts").join(file_name)
    }

    /// Directory holding fully assembled uploads.
    pub fn assembled_dir(&self) -> PathBuf {
        self.staging_dir.join("assembled")
    }
}
