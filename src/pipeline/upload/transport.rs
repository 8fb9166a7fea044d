use async_trait::async_trait;
use serde::Deserialize;

use crate::error::UploadError;
use crate::models::Chunk;

/// One chunk transmission as the receiver sees it.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    pub chunk: Chunk,
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

/// Sends a single chunk to the persistence collaborator.
///
/// Implementations must not retry on their own; the engine wraps every call
/// in its retry policy.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn send_chunk(&self, request: ChunkRequest<'_>) -> Result<(), UploadError>;
}

/// Optional failure body returned by the receiver.
#[derive(Debug, Deserialize)]
struct ChunkErrorBody {
    error: Option<String>,
    details: Option<serde_json::Value>,
}

/// Multipart transport against the chunk endpoint.
///
/// Fields: `chunk` (binary), `chunkNumber`, `totalChunks`, `isLastChunk`,
/// `fileName`.
pub struct HttpChunkTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpChunkTransport {
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::network(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(url, client))
    }

    pub fn with_client(url: &str, client: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }

    fn form(request: &ChunkRequest<'_>) -> Result<reqwest::multipart::Form, UploadError> {
        let part = reqwest::multipart::Part::bytes(request.bytes.to_vec())
            .file_name(request.file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| UploadError::upload_failed(format!("Invalid chunk part: {e}")))?;

        Ok(reqwest::multipart::Form::new()
            .part("chunk", part)
            .text("chunkNumber", request.chunk.index.to_string())
            .text("totalChunks", request.chunk.total_chunks.to_string())
            .text("isLastChunk", request.chunk.is_last.to_string())
            .text("fileName", request.file_name.to_string()))
    }
}

#[async_trait]
impl ChunkTransport for HttpChunkTransport {
    async fn send_chunk(&self, request: ChunkRequest<'_>) -> Result<(), UploadError> {
        let form = Self::form(&request)?;

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::from_transport(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(chunk_failure(status.as_u16(), &body))
    }
}

/// Build the failure for a non-2xx chunk response, falling back to a generic
/// message when the body is not the expected JSON.
pub(crate) fn chunk_failure(status: u16, body: &str) -> UploadError {
    match serde_json::from_str::<ChunkErrorBody>(body) {
        Ok(ChunkErrorBody {
            error: Some(message),
            details,
        }) => {
            let err = UploadError::upload_failed(message);
            match details {
                Some(details) => err.with_details(details),
                None => err,
            }
        }
        _ => UploadError::upload_failed(format!("Chunk upload failed with status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::ErrorKind;

    #[test]
    fn json_failure_body_is_used() {
        let err = chunk_failure(
            422,
            r#"{"error":"Chunk out of order","details":{"expected":2}}"#,
        );
        assert_eq!(err.kind, ErrorKind::UploadFailed);
        assert_eq!(err.message, "Chunk out of order");
        assert_eq!(err.details.unwrap()["expected"], 2);
    }

    #[test]
    fn non_json_failure_body_falls_back() {
        let err = chunk_failure(502, "<html>Bad Gateway</html>");
        assert_eq!(err.message, "Chunk upload failed with status 502");
        assert!(err.details.is_none());
    }

    #[test]
    fn json_without_error_field_falls_back() {
        let err = chunk_failure(500, r#"{"details":"x"}"#);
        assert_eq!(err.message, "Chunk upload failed with status 500");
    }

    #[tokio::test]
    async fn unreachable_server_is_offline() {
        // Port 9 (discard) on localhost is almost never listening.
        let transport = HttpChunkTransport::new(
            "http://127.0.0.1:9/api/uploads/chunk",
            std::time::Duration::from_secs(2),
        )
        .unwrap();
        let chunk = Chunk {
            file_id: uuid::Uuid::new_v4(),
            index: 0,
            total_chunks: 1,
            offset: 0,
            len: 3,
            is_last: true,
        };
        let err = transport
            .send_chunk(ChunkRequest {
                chunk,
                file_name: "a.txt",
                bytes: b"abc",
            })
            .await
            .unwrap_err();
        assert!(err.kind.is_connectivity());
    }
}
