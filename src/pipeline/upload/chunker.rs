//! Fixed-size chunk planning. Pure: no I/O, safe to re-run for a retry.

use uuid::Uuid;

use crate::models::Chunk;

/// Covers a file of `file_size` bytes with `chunk_size` byte ranges.
///
/// A zero-length file still produces one (empty) chunk so the receiver sees
/// an `isLastChunk` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_id: Uuid,
    file_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// `chunk_size` of 0 is clamped to 1.
    pub fn new(file_id: Uuid, file_size: u64, chunk_size: u64) -> Self {
        Self {
            file_id,
            file_size,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// `ceil(size / chunk_size)`, or 1 for an empty file.
    pub fn total_chunks(&self) -> usize {
        if self.file_size == 0 {
            1
        } else {
            self.file_size.div_ceil(self.chunk_size) as usize
        }
    }

    /// Chunk at `index`, if in range.
    pub fn chunk(&self, index: usize) -> Option<Chunk> {
        let total = self.total_chunks();
        if index >= total {
            return None;
        }
        let offset = index as u64 * self.chunk_size;
        let len = self.chunk_size.min(self.file_size - offset);
        Some(Chunk {
            file_id: self.file_id,
            index,
            total_chunks: total,
            offset,
            len,
            is_last: index + 1 == total,
        })
    }

    /// Lazy iterator in ascending index order. Each call starts over.
    pub fn chunks(&self) -> Chunks {
        Chunks {
            plan: *self,
            next: 0,
        }
    }

    /// Bytes confirmed after `chunk` is accepted: `min(offset + chunk_size, size)`.
    pub fn loaded_after(&self, chunk: &Chunk) -> u64 {
        (chunk.offset + self.chunk_size).min(self.file_size)
    }
}

/// Iterator returned by [`ChunkPlan::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks {
    plan: ChunkPlan,
    next: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let chunk = self.plan.chunk(self.next)?;
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.total_chunks().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}
