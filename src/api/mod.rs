//! Reference persistence collaborator.
//!
//! An axum server that receives chunked uploads and persists date groups
//! into SQLite. The ingestion side talks to it only over HTTP.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
