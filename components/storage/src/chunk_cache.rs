use std::collections::{hash_map::Entry, HashMap};

use bytes::Bytes;
use httpvfs_common::ChunkIndex;

/// A sparse, append-only map from chunk index to chunk bytes.
///
/// Chunks are slices of the response they came with, a response spanning
/// many chunks is stored once. A chunk never changes after insertion and is
/// kept until the cache is dropped.
#[derive(Debug)]
pub struct ChunkCache {
    chunk_size: usize,
    chunks: HashMap<ChunkIndex, Bytes>,
    resident_bytes: usize,
}

impl ChunkCache {
    pub fn new(chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            chunks: HashMap::new(),
            resident_bytes: 0,
        }
    }

    pub fn get(&self, idx: ChunkIndex) -> Option<&Bytes> { self.chunks.get(&idx) }

    pub fn contains(&self, idx: ChunkIndex) -> bool { self.chunks.contains_key(&idx) }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }

    pub fn resident_bytes(&self) -> usize { self.resident_bytes }

    /// Cut `data` into chunks, the first one being `start_chunk`. A short
    /// `data` fills as many chunks as it covers, the last one may be partial.
    /// Chunks already present are left alone. Returns the number of chunks
    /// newly inserted.
    pub fn fill(&mut self, start_chunk: ChunkIndex, data: Bytes) -> usize {
        let mut inserted = 0;
        for (i, offset) in (0..data.len()).step_by(self.chunk_size).enumerate() {
            let end = (offset + self.chunk_size).min(data.len());
            if let Entry::Vacant(entry) = self.chunks.entry(start_chunk + i) {
                entry.insert(data.slice(offset..end));
                self.resident_bytes += end - offset;
                inserted += 1;
            }
        }
        inserted
    }
}
