//! Chunk type - an offset-tracked slice of the source document.

use serde::{Deserialize, Serialize};

/// A bounded segment of document text.
///
/// `text` is always the exact slice `source[start_offset..end_offset]`
/// (byte offsets). Consecutive chunks never leave a gap: the next chunk
/// starts at or before the end of the previous one, and the shared region
/// is the overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk content
    pub text: String,

    /// Byte offset of the first character in the source text
    pub start_offset: usize,

    /// Byte offset one past the last character in the source text
    pub end_offset: usize,

    /// 0-based position in the chunk sequence
    pub sequence: usize,
}

impl Chunk {
    /// Create a chunk from a slice of the source text.
    pub fn from_source(source: &str, start_offset: usize, end_offset: usize, sequence: usize) -> Self {
        Self {
            text: source[start_offset..end_offset].to_string(),
            start_offset,
            end_offset,
            sequence,
        }
    }

    /// Length of the chunk text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the chunk holds no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of leading bytes shared with the previous chunk.
    pub fn overlap_with(&self, prev: Option<&Chunk>) -> usize {
        prev.map(|p| p.end_offset.saturating_sub(self.start_offset))
            .unwrap_or(0)
            .min(self.len())
    }

    /// The leading text this chunk repeats from the previous chunk.
    pub fn overlap_text(&self, prev: Option<&Chunk>) -> &str {
        &self.text[..self.overlap_with(prev)]
    }

    /// The part of this chunk that the previous chunk does not contain.
    pub fn fresh_text(&self, prev: Option<&Chunk>) -> &str {
        &self.text[self.overlap_with(prev)..]
    }
}

/// Rebuild the source text from a chunk sequence.
///
/// Concatenates the fresh (non-overlap) region of every chunk.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut out = String::with_capacity(chunks.last().map(|c| c.end_offset).unwrap_or(0));
    let mut prev: Option<&Chunk> = None;
    for chunk in chunks {
        out.push_str(chunk.fresh_text(prev));
        prev = Some(chunk);
    }
    out
}
