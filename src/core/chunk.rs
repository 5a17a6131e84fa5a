//! Chunk type produced by the chunker.

use serde::{Deserialize, Serialize};

/// A contiguous slice of a document's text.
///
/// Offsets count characters, not bytes, so they stay meaningful for
/// non-ASCII input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based position of this chunk.
    pub index: usize,
    /// Chunk text.
    pub text: String,
    /// Character offset of the first character (inclusive).
    pub start_offset: usize,
    /// Character offset one past the last character (exclusive).
    pub end_offset: usize,
    /// Number of chunks the document was split into.
    pub total_chunk_count: usize,
}

impl Chunk {
    /// 1-based location number of this chunk.
    #[must_use]
    pub const fn number(&self) -> usize {
        self.index + 1
    }

    /// Length of the chunk in characters.
    #[must_use]
    pub const fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Returns `true` if this is the last chunk of its document.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.index + 1 == self.total_chunk_count
    }
}
