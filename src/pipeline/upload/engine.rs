//! Chunked upload engine.
//!
//! Owns the `TrackedFile` registry. A file is validated, registered as
//! `pending`, then its chunks are sent strictly in index order, each through
//! the retry policy. The first chunk that exhausts its attempts abandons the
//! rest of the file. `retry` always restarts from chunk 0; the receiver
//! treats chunk indices idempotently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::chunker::ChunkPlan;
use super::retry::{RetryError, RetryPolicy};
use super::transport::{ChunkRequest, ChunkTransport};
use crate::config::IngestConfig;
use crate::error::UploadError;
use crate::models::enums::FileStatus;
use crate::models::{SourceFile, TrackedFile, UploadEvent, UploadProgress, Validation};

const EVENT_CAPACITY: usize = 256;

/// Pre-flight limits applied before any network activity.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadConstraints {
    pub max_file_size: u64,
    /// Exact media types or `type/*` wildcards.
    pub allowed_types: Vec<String>,
}

impl From<&IngestConfig> for UploadConstraints {
    fn from(config: &IngestConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            allowed_types: config.allowed_types.clone(),
        }
    }
}

/// Check size ceiling and media type. Wildcards (`image/*`) match by prefix.
pub fn validate(file: &SourceFile, constraints: &UploadConstraints) -> Validation {
    if file.size() > constraints.max_file_size {
        return Validation::rejected(format!(
            "File size {} exceeds the {} limit",
            format_size(file.size()),
            format_size(constraints.max_file_size)
        ));
    }

    let media_type = file
        .media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let allowed = constraints
        .allowed_types
        .iter()
        .any(|pattern| media_type_matches(pattern, &media_type));

    if !allowed {
        return Validation::rejected(format!(
            "File type '{}' is not allowed",
            if media_type.is_empty() { "unknown" } else { &media_type }
        ));
    }

    Validation::ok()
}

fn media_type_matches(pattern: &str, media_type: &str) -> bool {
    let pattern = pattern.trim().to_ascii_lowercase();
    if pattern == "*/*" || pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => media_type.starts_with(prefix),
        _ => pattern == media_type,
    }
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    let mb = bytes as f64 / MIB;
    if mb >= 1.0 {
        format!("{mb:.1} MB")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

struct FileEntry {
    file: TrackedFile,
    source: SourceFile,
    cancel: CancellationToken,
    /// Bumped by every transmission and by `cancel`. A transmission only
    /// writes to the record while its own attempt is still current.
    attempt: u64,
}

#[derive(Default)]
struct Registry {
    entries: HashMap<Uuid, FileEntry>,
    /// Registration order, for listing.
    order: Vec<Uuid>,
}

pub struct UploadEngine<T: ChunkTransport> {
    transport: T,
    retry: RetryPolicy,
    chunk_size: u64,
    constraints: UploadConstraints,
    registry: Mutex<Registry>,
    events: broadcast::Sender<UploadEvent>,
}

impl<T: ChunkTransport> UploadEngine<T> {
    pub fn new(transport: T, config: &IngestConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            retry: RetryPolicy::new(config.max_attempts, config.base_delay),
            chunk_size: config.chunk_size,
            constraints: UploadConstraints::from(config),
            registry: Mutex::new(Registry::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    pub fn constraints(&self) -> &UploadConstraints {
        &self.constraints
    }

    pub fn validate(&self, file: &SourceFile) -> Validation {
        validate(file, &self.constraints)
    }

    /// Validate, register and transmit a file. Returns the final record.
    pub async fn upload(&self, file: SourceFile) -> Result<TrackedFile, UploadError> {
        let id = self.register(file)?;
        self.transmit(id).await
    }

    /// Validate and register a file as `pending` without sending anything.
    pub fn register(&self, file: SourceFile) -> Result<Uuid, UploadError> {
        if let Err(e) = self.validate(&file).into_result() {
            tracing::info!(name = %file.name, reason = %e.message, "Upload rejected by validation");
            return Err(e);
        }

        let tracked = TrackedFile::pending(&file);
        let id = tracked.id;
        let name = tracked.name.clone();
        {
            let mut registry = self.lock();
            registry.order.push(id);
            registry.entries.insert(
                id,
                FileEntry {
                    file: tracked,
                    source: file,
                    cancel: CancellationToken::new(),
                    attempt: 0,
                },
            );
        }

        tracing::debug!(file_id = %id, name = %name, "File registered");
        self.emit(UploadEvent::Registered { file_id: id, name });
        Ok(id)
    }

    /// Send every chunk of a registered file, in order.
    pub async fn transmit(&self, id: Uuid) -> Result<TrackedFile, UploadError> {
        let (source, cancel, attempt) = {
            let mut registry = self.lock();
            let entry = registry
                .entries
                .get_mut(&id)
                .ok_or_else(|| unknown_file(id))?;
            if entry.file.status == FileStatus::Uploading {
                return Err(UploadError::upload_failed("Upload already in progress"));
            }
            if entry.cancel.is_cancelled() {
                entry.cancel = CancellationToken::new();
            }
            entry.attempt += 1;
            entry.file.status = FileStatus::Uploading;
            entry.file.error = None;
            (entry.source.clone(), entry.cancel.clone(), entry.attempt)
        };
        self.emit_status(id, FileStatus::Uploading, None);

        let plan = ChunkPlan::new(id, source.size(), self.chunk_size);
        tracing::info!(
            file_id = %id,
            name = %source.name,
            size = source.size(),
            total_chunks = plan.total_chunks(),
            "Starting chunked upload"
        );

        for chunk in plan.chunks() {
            let bytes = chunk.slice(&source.data);
            let outcome = self
                .retry
                .execute_with(
                    &cancel,
                    |_attempt| {
                        self.transport.send_chunk(ChunkRequest {
                            chunk,
                            file_name: &source.name,
                            bytes,
                        })
                    },
                    |_| true,
                    |attempt, delay, err| {
                        tracing::warn!(
                            file_id = %id,
                            chunk_index = chunk.index,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Chunk transmission failed, retrying"
                        );
                        self.emit(UploadEvent::ChunkRetry {
                            file_id: id,
                            chunk_index: chunk.index,
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        });
                    },
                )
                .await;

            match outcome {
                Ok(()) => {
                    let progress = UploadProgress::new(plan.loaded_after(&chunk), plan.file_size());
                    self.record_progress(id, attempt, progress);
                }
                Err(RetryError::Cancelled) => {
                    tracing::info!(file_id = %id, chunk_index = chunk.index, "Upload cancelled");
                    return Err(self.fail(id, Some(attempt), UploadError::cancelled()));
                }
                Err(RetryError::Exhausted { attempts, last })
                | Err(RetryError::NotRetryable {
                    attempt: attempts,
                    error: last,
                }) => {
                    tracing::error!(
                        file_id = %id,
                        chunk_index = chunk.index,
                        attempts,
                        error = %last,
                        "Chunk retries exhausted, abandoning file"
                    );
                    return Err(self.fail(
                        id,
                        Some(attempt),
                        exhausted_error(chunk.index, attempts, last),
                    ));
                }
            }
        }

        let file = self.finish(id, attempt)?;
        tracing::info!(file_id = %id, "Upload completed");
        Ok(file)
    }

    /// Abort the in-flight transmission. Chunks already accepted by the
    /// receiver stay there.
    pub fn cancel(&self, id: Uuid) -> Result<(), UploadError> {
        let token = {
            let mut registry = self.lock();
            let entry = registry
                .entries
                .get_mut(&id)
                .ok_or_else(|| unknown_file(id))?;
            entry.attempt += 1;
            entry.cancel.clone()
        };
        token.cancel();
        self.fail(id, None, UploadError::cancelled());
        Ok(())
    }

    /// Reset to `pending` with zero progress and resend from chunk 0.
    pub async fn retry(&self, id: Uuid) -> Result<TrackedFile, UploadError> {
        {
            let mut registry = self.lock();
            let entry = registry
                .entries
                .get_mut(&id)
                .ok_or_else(|| unknown_file(id))?;
            if entry.file.status == FileStatus::Uploading {
                return Err(UploadError::upload_failed("Upload already in progress"));
            }
            entry.file.progress = 0;
            entry.file.status = FileStatus::Pending;
            entry.file.error = None;
            entry.cancel = CancellationToken::new();
        }
        tracing::info!(file_id = %id, "Retrying upload from the first chunk");
        self.emit_status(id, FileStatus::Pending, None);
        self.transmit(id).await
    }

    /// Mark a completed upload as being processed by the extraction collaborators.
    pub fn begin_processing(&self, id: Uuid) -> Result<(), UploadError> {
        {
            let mut registry = self.lock();
            let entry = registry
                .entries
                .get_mut(&id)
                .ok_or_else(|| unknown_file(id))?;
            if entry.file.status != FileStatus::Completed {
                return Err(UploadError::upload_failed(format!(
                    "Cannot process a file in state {}",
                    entry.file.status
                )));
            }
            entry.file.status = FileStatus::Processing;
        }
        self.emit_status(id, FileStatus::Processing, None);
        Ok(())
    }

    /// Close the processing phase: `completed` on success, `error` otherwise.
    pub fn finish_processing(&self, id: Uuid, result: Result<(), &UploadError>) {
        match result {
            Ok(()) => {
                let updated = self.update(id, |file| {
                    file.status = FileStatus::Completed;
                    file.error = None;
                });
                if updated {
                    self.emit_status(id, FileStatus::Completed, None);
                }
            }
            Err(e) => {
                self.fail(id, None, e.clone());
            }
        }
    }

    pub fn file(&self, id: Uuid) -> Option<TrackedFile> {
        self.lock().entries.get(&id).map(|e| e.file.clone())
    }

    /// All tracked files in registration order.
    pub fn files(&self) -> Vec<TrackedFile> {
        let registry = self.lock();
        registry
            .order
            .iter()
            .filter_map(|id| registry.entries.get(id).map(|e| e.file.clone()))
            .collect()
    }

    /// Drop one file from the session, cancelling it if still in flight.
    pub fn remove(&self, id: Uuid) -> Option<TrackedFile> {
        let mut registry = self.lock();
        registry.order.retain(|other| *other != id);
        let entry = registry.entries.remove(&id)?;
        entry.cancel.cancel();
        Some(entry.file)
    }

    /// Clear the upload session. In-flight transmissions are cancelled.
    pub fn clear(&self) {
        let mut registry = self.lock();
        for entry in registry.entries.values() {
            entry.cancel.cancel();
        }
        registry.entries.clear();
        registry.order.clear();
        tracing::debug!("Upload session cleared");
    }

    fn record_progress(&self, id: Uuid, attempt: u64, progress: UploadProgress) {
        let updated = self.update_attempt(id, Some(attempt), |file| {
            // monotonic while uploading
            file.progress = file.progress.max(progress.percentage);
        });
        if updated {
            tracing::debug!(file_id = %id, loaded = progress.loaded, total = progress.total, "Chunk accepted");
            self.emit(UploadEvent::Progress {
                file_id: id,
                progress,
            });
        }
    }

    fn finish(&self, id: Uuid, attempt: u64) -> Result<TrackedFile, UploadError> {
        let file = {
            let mut registry = self.lock();
            let entry = registry
                .entries
                .get_mut(&id)
                .ok_or_else(|| unknown_file(id))?;
            if entry.attempt != attempt {
                tracing::debug!(file_id = %id, attempt, "Superseded upload finished, ignoring");
                return Err(UploadError::cancelled());
            }
            entry.file.status = FileStatus::Completed;
            entry.file.progress = 100;
            entry.file.error = None;
            entry.file.clone()
        };
        self.emit_status(id, FileStatus::Completed, None);
        Ok(file)
    }

    /// Move to `error` (once per distinct message) and hand the error back.
    /// With `Some(attempt)` the record is left alone once that attempt has
    /// been superseded.
    fn fail(&self, id: Uuid, attempt: Option<u64>, error: UploadError) -> UploadError {
        let mut changed = false;
        self.update_attempt(id, attempt, |file| {
            if file.status != FileStatus::Error || file.error.as_deref() != Some(&error.message) {
                file.status = FileStatus::Error;
                file.error = Some(error.message.clone());
                changed = true;
            }
        });
        if changed {
            self.emit_status(id, FileStatus::Error, Some(error.message.clone()));
        }
        error
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut TrackedFile)) -> bool {
        self.update_attempt(id, None, f)
    }

    fn update_attempt(
        &self,
        id: Uuid,
        attempt: Option<u64>,
        f: impl FnOnce(&mut TrackedFile),
    ) -> bool {
        match self.lock().entries.get_mut(&id) {
            Some(entry) if attempt.map_or(true, |a| a == entry.attempt) => {
                f(&mut entry.file);
                true
            }
            Some(_) => {
                tracing::debug!(file_id = %id, ?attempt, "Ignoring update from superseded upload");
                false
            }
            None => false,
        }
    }

    fn emit_status(&self, id: Uuid, status: FileStatus, error: Option<String>) {
        self.emit(UploadEvent::StatusChanged {
            file_id: id,
            status,
            error,
        });
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ChunkTransport> UploadEngine<T> {
    /// Convenience for sharing across tasks.
    pub fn shared(transport: T, config: &IngestConfig) -> Arc<Self> {
        Arc::new(Self::new(transport, config))
    }
}

fn unknown_file(id: Uuid) -> UploadError {
    UploadError::upload_failed(format!("Unknown file: {id}"))
}

/// Connectivity failures keep their kind so callers can offer a reconnect.
fn exhausted_error(chunk_index: usize, attempts: u32, last: UploadError) -> UploadError {
    if last.kind.is_connectivity() {
        return last;
    }
    let details = serde_json::json!({
        "chunkNumber": chunk_index,
        "attempts": attempts,
        "lastError": last.message,
    });
    UploadError::upload_failed(format!(
        "Chunk {chunk_index} failed after {attempts} attempts: {}",
        last.message
    ))
    .with_details(details)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::models::enums::ErrorKind;

    const BASE: Duration = Duration::from_millis(100);

    /// Records every call; fails chunk `fail_index` for the first `fail_times` calls.
    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<(usize, Instant, Vec<u8>)>>,
        fail_index: Option<usize>,
        fail_times: usize,
        failures: AtomicUsize,
        offline: bool,
        hang: bool,
        /// Only the very first call hangs.
        hang_first: bool,
        latency: Option<Duration>,
    }

    impl MockTransport {
        fn failing(index: usize, times: usize) -> Self {
            Self {
                fail_index: Some(index),
                fail_times: times,
                ..Self::default()
            }
        }

        fn call_indices(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(|c| c.0).collect()
        }
    }

    #[async_trait]
    impl ChunkTransport for MockTransport {
        async fn send_chunk(&self, request: ChunkRequest<'_>) -> Result<(), UploadError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((request.chunk.index, Instant::now(), request.bytes.to_vec()));
                calls.len() - 1
            };
            if self.hang || (self.hang_first && call == 0) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if self.offline {
                return Err(UploadError::offline("no route to host"));
            }
            if Some(request.chunk.index) == self.fail_index
                && self.failures.fetch_add(1, Ordering::SeqCst) < self.fail_times
            {
                return Err(UploadError::upload_failed("HTTP 503"));
            }
            Ok(())
        }
    }

    fn config(chunk_size: u64) -> IngestConfig {
        IngestConfig {
            chunk_size,
            max_attempts: 3,
            base_delay: BASE,
            max_file_size: 1024,
            ..IngestConfig::default()
        }
    }

    fn pdf(size: usize) -> SourceFile {
        SourceFile::new("labs.pdf", "application/pdf", vec![7u8; size])
    }

    #[test]
    fn validate_rejects_oversized_file_with_size_reason() {
        let constraints = UploadConstraints::from(&config(10));
        let result = validate(&pdf(2048), &constraints);
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains("exceeds"));
    }

    #[test]
    fn validate_matches_wildcards_by_prefix() {
        let constraints = UploadConstraints::from(&config(10));
        let png = SourceFile::new("scan.png", "image/png", vec![0; 4]);
        let zip = SourceFile::new("x.zip", "application/zip", vec![0; 4]);
        let text = SourceFile::new("r.txt", "text/plain; charset=utf-8", vec![0; 4]);
        assert!(validate(&png, &constraints).valid);
        assert!(validate(&text, &constraints).valid);
        let rejected = validate(&zip, &constraints);
        assert!(!rejected.valid);
        assert!(rejected.reason.unwrap().contains("application/zip"));
    }

    #[test]
    fn wildcard_does_not_match_other_top_level_type() {
        assert!(media_type_matches("image/*", "image/heic"));
        assert!(!media_type_matches("image/*", "imagex/png"));
        assert!(!media_type_matches("image/*", "application/pdf"));
        assert!(media_type_matches("*/*", "application/zip"));
    }

    #[tokio::test]
    async fn oversized_file_never_reaches_transport() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        let err = engine.upload(pdf(4096)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationFailed);
        assert!(engine.transport.calls.lock().unwrap().is_empty());
        assert!(engine.files().is_empty());
    }

    #[tokio::test]
    async fn uploads_chunks_in_order_and_completes() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        let data: Vec<u8> = (0..25u8).collect();
        let file = engine
            .upload(SourceFile::new("r.txt", "text/plain", data.clone()))
            .await
            .unwrap();

        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(file.progress, 100);
        assert_eq!(engine.transport.call_indices(), vec![0, 1, 2]);
        let sent: Vec<u8> = engine
            .transport
            .calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|c| c.2.clone())
            .collect();
        assert_eq!(sent, data);
    }

    #[tokio::test]
    async fn progress_events_are_monotonic() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        let mut events = engine.subscribe();
        engine.upload(pdf(25)).await.unwrap();

        let mut percentages = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let UploadEvent::Progress { progress, .. } = event {
                percentages.push(progress.percentage);
            }
        }
        assert_eq!(percentages, vec![40, 80, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn middle_chunk_recovers_on_third_attempt() {
        let engine = UploadEngine::new(MockTransport::failing(1, 2), &config(10));
        let file = engine.upload(pdf(30)).await.unwrap();

        assert_eq!(file.status, FileStatus::Completed);
        let calls = engine.transport.calls.lock().unwrap();
        let indices: Vec<usize> = calls.iter().map(|c| c.0).collect();
        assert_eq!(indices, vec![0, 1, 1, 1, 2]);
        // backoff between the three attempts on chunk 1
        assert_eq!(calls[2].1 - calls[1].1, BASE);
        assert_eq!(calls[3].1 - calls[2].1, BASE * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_chunk_abandons_remaining_chunks() {
        let engine = UploadEngine::new(MockTransport::failing(1, 10), &config(10));
        let err = engine.upload(pdf(30)).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::UploadFailed);
        assert!(err.message.contains("Chunk 1 failed after 3 attempts"));
        assert_eq!(engine.transport.call_indices(), vec![0, 1, 1, 1]);

        let file = engine.files().pop().unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(file.progress, 33);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_failure_keeps_connectivity_kind() {
        let transport = MockTransport {
            offline: true,
            ..MockTransport::default()
        };
        let engine = UploadEngine::new(transport, &config(10));
        let err = engine.upload(pdf(5)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_restarts_from_first_chunk() {
        let engine = UploadEngine::new(MockTransport::failing(2, 3), &config(10));
        let id = engine.register(pdf(30)).unwrap();
        assert!(engine.transmit(id).await.is_err());

        let file = engine.retry(id).await.unwrap();
        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(
            engine.transport.call_indices(),
            vec![0, 1, 2, 2, 2, 0, 1, 2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_in_flight_upload() {
        let transport = MockTransport {
            hang: true,
            ..MockTransport::default()
        };
        let engine = Arc::new(UploadEngine::new(transport, &config(10)));
        let id = engine.register(pdf(30)).unwrap();

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.transmit(id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.cancel(id).unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancellation());
        let file = engine.file(id).unwrap();
        assert_eq!(file.status, FileStatus::Error);
        assert_eq!(file.error.as_deref(), Some("Upload cancelled"));
        assert_eq!(engine.transport.call_indices(), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_transmission_does_not_touch_the_retry() {
        let transport = MockTransport {
            hang_first: true,
            latency: Some(Duration::from_millis(5)),
            ..MockTransport::default()
        };
        let engine = Arc::new(UploadEngine::new(transport, &config(10)));
        let id = engine.register(pdf(30)).unwrap();
        let mut events = engine.subscribe();

        let first = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.transmit(id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.cancel(id).unwrap();

        let retried = engine.retry(id).await.unwrap();
        assert!(first.await.unwrap().unwrap_err().is_cancellation());
        assert_eq!(retried.status, FileStatus::Completed);
        assert_eq!(engine.file(id).unwrap().status, FileStatus::Completed);

        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let UploadEvent::StatusChanged { status, error, .. } = event {
                statuses.push((status, error));
            }
        }
        assert_eq!(
            statuses,
            vec![
                (FileStatus::Uploading, None),
                (FileStatus::Error, Some("Upload cancelled".to_string())),
                (FileStatus::Pending, None),
                (FileStatus::Uploading, None),
                (FileStatus::Completed, None),
            ]
        );
        // one hung call, then a clean resend of all three chunks
        assert_eq!(engine.transport.call_indices(), vec![0, 0, 1, 2]);
    }

    #[tokio::test]
    async fn processing_transitions() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        let file = engine.upload(pdf(5)).await.unwrap();

        engine.begin_processing(file.id).unwrap();
        assert_eq!(engine.file(file.id).unwrap().status, FileStatus::Processing);

        let err = UploadError::new(ErrorKind::MarkerExtractionFailed, "no markers");
        engine.finish_processing(file.id, Err(&err));
        let after = engine.file(file.id).unwrap();
        assert_eq!(after.status, FileStatus::Error);
        assert_eq!(after.error.as_deref(), Some("no markers"));
    }

    #[tokio::test]
    async fn clear_destroys_tracked_files() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        engine.upload(pdf(5)).await.unwrap();
        let second = engine.register(pdf(5)).unwrap();
        assert_eq!(engine.files().len(), 2);

        assert!(engine.remove(second).is_some());
        assert_eq!(engine.files().len(), 1);
        engine.clear();
        assert!(engine.files().is_empty());
    }

    #[tokio::test]
    async fn empty_file_sends_one_chunk() {
        let engine = UploadEngine::new(MockTransport::default(), &config(10));
        let file = engine.upload(pdf(0)).await.unwrap();
        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(engine.transport.call_indices(), vec![0]);
    }
}
