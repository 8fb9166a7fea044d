//! Resumable chunked upload: chunk planning, retry policy, transport, engine.

pub mod chunker;
pub mod engine;
pub mod retry;
pub mod transport;

pub use chunker::{ChunkPlan, Chunks};
pub use engine::{validate, UploadConstraints, UploadEngine};
pub use retry::{RetryError, RetryPolicy};
pub use transport::{ChunkRequest, ChunkTransport, HttpChunkTransport};
