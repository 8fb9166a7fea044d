//! Chunk receiver.
//!
//! `POST /api/uploads/chunk` takes one multipart chunk
//! (`chunk`, `chunkNumber`, `totalChunks`, `isLastChunk`, `fileName`).
//! Re-sending an index overwrites it. When the last chunk arrives and every
//! index is on disk, the parts are concatenated into the assembled file.
//! `GET /api/uploads/:file_name` describes an assembled file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::{Multipart, Path as RoutePath, State};
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository::{self, AssembledUpload, ChunkReceipt};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkResponse {
    pub success: bool,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub assembled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_chunks: Vec<u32>,
}

/// Parsed multipart fields of one chunk request.
#[derive(Debug)]
struct ChunkForm {
    bytes: Bytes,
    chunk_number: u32,
    total_chunks: u32,
    is_last: bool,
    file_name: String,
}

/// `POST /api/uploads/chunk`
pub async fn receive_chunk(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<Json<ChunkResponse>, ApiError> {
    let form = read_form(multipart).await?;

    if form.bytes.len() > ctx.max_chunk_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "Chunk of {} bytes exceeds the {} byte limit",
            form.bytes.len(),
            ctx.max_chunk_bytes
        )));
    }

    let parts_dir = ctx.parts_dir(&form.file_name);
    tokio::fs::create_dir_all(&parts_dir).await?;
    let staged_path = parts_dir.join(format!("{}.part", form.chunk_number));
    tokio::fs::write(&staged_path, &form.bytes).await?;

    {
        let conn = ctx.db()?;
        repository::upsert_chunk_receipt(
            &conn,
            &ChunkReceipt {
                file_name: form.file_name.clone(),
                chunk_number: form.chunk_number,
                total_chunks: form.total_chunks,
                size: form.bytes.len() as u64,
                staged_path: staged_path.clone(),
            },
        )?;
    }

    tracing::debug!(
        file_name = %form.file_name,
        chunk_number = form.chunk_number,
        total_chunks = form.total_chunks,
        size = form.bytes.len(),
        "Chunk received"
    );

    let mut response = ChunkResponse {
        success: true,
        chunk_number: form.chunk_number,
        total_chunks: form.total_chunks,
        assembled: false,
        missing_chunks: Vec::new(),
    };

    if form.is_last {
        let receipts = {
            let conn = ctx.db()?;
            repository::get_chunk_receipts(&conn, &form.file_name)?
        };
        let missing = missing_chunks(&receipts, form.total_chunks);
        if missing.is_empty() {
            let upload = assemble(&ctx, &form.file_name, form.total_chunks, &receipts).await?;
            tracing::info!(
                file_name = %upload.file_name,
                size = upload.size,
                total_chunks = upload.total_chunks,
                "Upload assembled"
            );
            response.assembled = true;
        } else {
            tracing::warn!(
                file_name = %form.file_name,
                missing = ?missing,
                "Last chunk arrived with gaps, not assembling"
            );
            response.missing_chunks = missing;
        }
    }

    Ok(Json(response))
}

/// `GET /api/uploads/:file_name`
pub async fn assembled(
    State(ctx): State<ApiContext>,
    RoutePath(file_name): RoutePath<String>,
) -> Result<Json<AssembledUpload>, ApiError> {
    let file_name = safe_file_name(&file_name)?;
    let conn = ctx.db()?;
    repository::get_assembled_upload(&conn, &file_name)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No assembled upload named '{file_name}'")))
}

async fn read_form(mut multipart: Multipart) -> Result<ChunkForm, ApiError> {
    let mut bytes = None;
    let mut chunk_number = None;
    let mut total_chunks = None;
    let mut is_last = None;
    let mut file_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chunk" => {
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Unreadable chunk: {e}")))?,
                );
            }
            "chunkNumber" | "totalChunks" | "isLastChunk" | "fileName" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable field {name}: {e}")))?;
                match name.as_str() {
                    "chunkNumber" => chunk_number = Some(parse_field::<u32>(&name, &value)?),
                    "totalChunks" => total_chunks = Some(parse_field::<u32>(&name, &value)?),
                    "isLastChunk" => is_last = Some(parse_field::<bool>(&name, &value)?),
                    _ => file_name = Some(value),
                }
            }
            // unknown fields are ignored
            _ => {}
        }
    }

    let form = ChunkForm {
        bytes: bytes.ok_or_else(|| missing("chunk"))?,
        chunk_number: chunk_number.ok_or_else(|| missing("chunkNumber"))?,
        total_chunks: total_chunks.ok_or_else(|| missing("totalChunks"))?,
        is_last: is_last.ok_or_else(|| missing("isLastChunk"))?,
        file_name: safe_file_name(&file_name.ok_or_else(|| missing("fileName"))?)?,
    };

    if form.total_chunks == 0 || form.chunk_number >= form.total_chunks {
        return Err(ApiError::Invalid {
            message: "Chunk number out of range".into(),
            details: serde_json::json!({
                "chunkNumber": form.chunk_number,
                "totalChunks": form.total_chunks,
            }),
        });
    }
    if form.is_last != (form.chunk_number + 1 == form.total_chunks) {
        return Err(ApiError::Invalid {
            message: "isLastChunk does not match chunkNumber".into(),
            details: serde_json::json!({
                "chunkNumber": form.chunk_number,
                "totalChunks": form.total_chunks,
                "isLastChunk": form.is_last,
            }),
        });
    }

    Ok(form)
}

fn parse_field<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: '{value}'")))
}

fn missing(field: &str) -> ApiError {
    ApiError::BadRequest(format!("Missing multipart field '{field}'"))
}

/// Only a bare file name is accepted; anything path-like is rejected.
fn safe_file_name(raw: &str) -> Result<String, ApiError> {
    let name = raw.trim();
    let is_bare = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
    if name.is_empty() || !is_bare || name.starts_with('.') || name.contains('\\') {
        return Err(ApiError::BadRequest(format!("Invalid file name '{raw}'")));
    }
    Ok(name.to_string())
}

fn missing_chunks(receipts: &[ChunkReceipt], total_chunks: u32) -> Vec<u32> {
    let present: BTreeSet<u32> = receipts
        .iter()
        .filter(|r| r.total_chunks == total_chunks)
        .map(|r| r.chunk_number)
        .collect();
    (0..total_chunks).filter(|n| !present.contains(n)).collect()
}

async fn assemble(
    ctx: &ApiContext,
    file_name: &str,
    total_chunks: u32,
    receipts: &[ChunkReceipt],
) -> Result<AssembledUpload, ApiError> {
    let assembled_dir = ctx.assembled_dir();
    tokio::fs::create_dir_all(&assembled_dir).await?;

    let mut data = Vec::new();
    for receipt in receipts.iter().filter(|r| r.chunk_number < total_chunks) {
        data.extend_from_slice(&tokio::fs::read(&receipt.staged_path).await?);
    }

    let path: PathBuf = assembled_dir.join(file_name);
    tokio::fs::write(&path, &data).await?;

    let upload = AssembledUpload {
        file_name: file_name.to_string(),
        total_chunks,
        size: data.len() as u64,
        path,
    };

    {
        let conn = ctx.db()?;
        repository::record_assembled_upload(&conn, &upload)?;
        repository::delete_chunk_receipts(&conn, file_name)?;
    }

    if let Err(e) = tokio::fs::remove_dir_all(ctx.parts_dir(file_name)).await {
        tracing::warn!(file_name, error = %e, "Could not remove staged parts");
    }

    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(n: u32, total: u32) -> ChunkReceipt {
        ChunkReceipt {
            file_name: "labs.pdf".into(),
            chunk_number: n,
            total_chunks: total,
            size: 1,
            staged_path: PathBuf::from(format!("{n}.part")),
        }
    }

    #[test]
    fn file_names_must_be_bare() {
        assert_eq!(safe_file_name(" labs.pdf ").unwrap(), "labs.pdf");
        for bad in ["", "../etc/passwd", "a/b.pdf", ".hidden", "c:\\x.pdf"] {
            assert!(safe_file_name(bad).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn gaps_are_reported() {
        let receipts = [receipt(0, 4), receipt(2, 4), receipt(3, 4)];
        assert_eq!(missing_chunks(&receipts, 4), [1]);
        assert!(missing_chunks(&[receipt(0, 1)], 1).is_empty());
    }

    #[test]
    fn receipts_from_an_older_plan_do_not_count() {
        let receipts = [receipt(0, 2), receipt(1, 3)];
        assert_eq!(missing_chunks(&receipts, 2), [1]);
    }
}
