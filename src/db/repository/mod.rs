//! Repository layer: table-scoped database operations.

mod lab_marker;
mod upload_chunk;

pub use lab_marker::*;
pub use upload_chunk::*;
