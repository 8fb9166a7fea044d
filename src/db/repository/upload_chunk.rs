use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::db::DatabaseError;

/// One chunk accepted by the receiver, staged on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub file_name: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub size: u64,
    pub staged_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledUpload {
    pub file_name: String,
    pub total_chunks: u32,
    pub size: u64,
    pub path: PathBuf,
}

/// Record a chunk. Re-sending the same index replaces the earlier receipt.
pub fn upsert_chunk_receipt(conn: &Connection, receipt: &ChunkReceipt) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO upload_chunks (file_name, chunk_number, total_chunks, size, staged_path)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(file_name, chunk_number) DO UPDATE SET
            total_chunks = excluded.total_chunks,
            size = excluded.size,
            staged_path = excluded.staged_path,
            received_at = datetime('now')",
        params![
            receipt.file_name,
            receipt.chunk_number,
            receipt.total_chunks,
            receipt.size as i64,
            receipt.staged_path.to_string_lossy().into_owned(),
        ],
    )?;
    Ok(())
}

/// Receipts for one file in chunk order.
pub fn get_chunk_receipts(conn: &Connection, file_name: &str) -> Result<Vec<ChunkReceipt>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT file_name, chunk_number, total_chunks, size, staged_path
         FROM upload_chunks WHERE file_name = ?1 ORDER BY chunk_number",
    )?;
    let rows = stmt.query_map(params![file_name], |row| {
        Ok(ChunkReceipt {
            file_name: row.get(0)?,
            chunk_number: row.get(1)?,
            total_chunks: row.get(2)?,
            size: row.get::<_, i64>(3)? as u64,
            staged_path: PathBuf::from(row.get::<_, String>(4)?),
        })
    })?;

    let mut receipts = Vec::new();
    for row in rows {
        receipts.push(row?);
    }
    Ok(receipts)
}

pub fn delete_chunk_receipts(conn: &Connection, file_name: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute("DELETE FROM upload_chunks WHERE file_name = ?1", params![file_name])?;
    Ok(deleted)
}

pub fn record_assembled_upload(conn: &Connection, upload: &AssembledUpload) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO assembled_uploads (file_name, total_chunks, size, path)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            upload.file_name,
            upload.total_chunks,
            upload.size as i64,
            upload.path.to_string_lossy().into_owned(),
        ],
    )?;
    Ok(())
}

pub fn get_assembled_upload(
    conn: &Connection,
    file_name: &str,
) -> Result<Option<AssembledUpload>, DatabaseError> {
    let upload = conn
        .query_row(
            "SELECT file_name, total_chunks, size, path FROM assembled_uploads WHERE file_name = ?1",
            params![file_name],
            |row| {
                Ok(AssembledUpload {
                    file_name: row.get(0)?,
                    total_chunks: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    path: PathBuf::from(row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(upload)
}
