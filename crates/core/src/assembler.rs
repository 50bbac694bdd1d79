//! Chunk Assembler
//!
//! Accumulates indexed text fragments from an unordered, possibly redelivering
//! transport into an ordered document. Chunks are upserted by index and the
//! document is read back in ascending index order, so the view only ever
//! improves as chunks arrive, whatever order they arrive in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Upper bound on the gaps reported by `ChunkAssembler::missing_indices`.
pub const MISSING_INDICES_LIMIT: usize = 256;

/// One fragment of a larger generated text.
///
/// `index` is `None` for unindexed input; the assembler assigns the next
/// position after the highest index it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    pub content: String,
}

impl Chunk {
    /// Create an indexed chunk
    pub fn indexed(index: i64, content: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            content: content.into(),
        }
    }

    /// Create an unindexed chunk
    pub fn unindexed(content: impl Into<String>) -> Self {
        Self {
            index: None,
            content: content.into(),
        }
    }
}

/// What `add_chunk` did with a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Stored at a previously empty index
    Inserted { index: u64 },
    /// Overwrote the chunk already held at this index
    Replaced { index: u64 },
    /// The assembler is sealed; the chunk was dropped
    Ignored,
}

/// Gap-tolerant, index-ordered chunk store.
#[derive(Debug, Default, Clone)]
pub struct ChunkAssembler {
    chunks: BTreeMap<u64, String>,
    sealed: bool,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a chunk.
    ///
    /// Negative indices are rejected with `InvalidChunkIndex` and leave the
    /// assembler untouched. Same-index chunks are last-write-wins.
    pub fn add_chunk(&mut self, chunk: Chunk) -> CoreResult<ChunkOutcome> {
        if self.sealed {
            return Ok(ChunkOutcome::Ignored);
        }

        let index = match chunk.index {
            Some(i) if i < 0 => return Err(CoreError::InvalidChunkIndex(i)),
            Some(i) => i as u64,
            None => self.next_index(),
        };

        match self.chunks.insert(index, chunk.content) {
            Some(_) => Ok(ChunkOutcome::Replaced { index }),
            None => Ok(ChunkOutcome::Inserted { index }),
        }
    }

    /// Concatenation of all held chunks in ascending index order.
    pub fn current_text(&self) -> String {
        let capacity = self.chunks.values().map(String::len).sum();
        self.chunks
            .values()
            .fold(String::with_capacity(capacity), |mut text, content| {
                text.push_str(content);
                text
            })
    }

    /// Indices below the highest held index that have not arrived yet,
    /// lowest first and at most `MISSING_INDICES_LIMIT` of them.
    ///
    /// Walks the gaps between held keys, so the cost is bounded by the number
    /// of chunks held plus the limit, not by the size of the largest index.
    pub fn missing_indices(&self) -> Vec<u64> {
        let mut missing = Vec::new();
        let mut expected = 0u64;
        for &index in self.chunks.keys() {
            let gap_end = index.min(expected + (MISSING_INDICES_LIMIT - missing.len()) as u64);
            missing.extend(expected..gap_end);
            if missing.len() >= MISSING_INDICES_LIMIT {
                break;
            }
            expected = index + 1;
        }
        missing
    }

    /// Stop accepting chunks. Later `add_chunk` calls return `Ignored`.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn next_index(&self) -> u64 {
        self.chunks.keys().next_back().map_or(0, |max| max + 1)
    }
}
