//! Chunker - split document text into overlapping, paragraph-aligned chunks.
//!
//! Paragraph breaks (`"\n\n"`) are the only split points. Paragraphs are
//! packed greedily until the next one would push the chunk past
//! `max_size`; the following chunk is then seeded with the tail of the
//! closed one so that text straddling the boundary is visible in both.
//!
//! Seeding prefers whole trailing paragraphs that fit in `overlap` bytes and
//! falls back to the last `overlap` bytes of the final paragraph. The seed
//! is shrunk as needed so it never pushes a chunk past `max_size`; when no
//! room is left, the next chunk starts right where the previous one ended
//! (including the paragraph break), so chunks always tile the source.

use std::ops::Range;

use tracing::debug;

use crate::error::{ContractError, Result};
use crate::types::{chunk::Chunk, config::PipelineConfig};

/// Separator between paragraphs.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Paragraph-aware splitter with fixed size and overlap limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, rejecting `overlap >= max_size`.
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 || overlap >= max_size {
            return Err(ContractError::ChunkConfig { max_size, overlap });
        }
        Ok(Self { max_size, overlap })
    }

    /// Create a chunker from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.max_chunk_size, config.chunk_overlap)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into chunks.
    ///
    /// Empty text yields no chunks; text without paragraph breaks yields a
    /// single chunk regardless of its size.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let paragraphs = paragraph_spans(text);
        let mut chunks = Vec::new();

        let first = paragraphs[0].clone();
        let mut start = first.start;
        let mut end = first.end;
        // Whole paragraphs in the open chunk; a partial-paragraph seed is not tracked
        let mut members = vec![first];

        for para in paragraphs.into_iter().skip(1) {
            if para.end - start <= self.max_size {
                end = para.end;
                members.push(para);
                continue;
            }

            chunks.push(Chunk::from_source(text, start, end, chunks.len()));

            let seed = self.seed_start(text, &members, start, end, para.end);
            members.retain(|m| m.start >= seed);
            start = seed;
            end = para.end;
            members.push(para);
        }

        chunks.push(Chunk::from_source(text, start, end, chunks.len()));

        debug!(
            text_len = text.len(),
            chunk_count = chunks.len(),
            max_size = self.max_size,
            overlap = self.overlap,
            "Chunked document"
        );

        chunks
    }

    /// Where the chunk after `[start, end)` begins, given that it must reach
    /// `next_end`.
    fn seed_start(
        &self,
        text: &str,
        members: &[Range<usize>],
        start: usize,
        end: usize,
        next_end: usize,
    ) -> usize {
        if self.overlap == 0 {
            return end;
        }

        let floor = start
            .max(end.saturating_sub(self.overlap))
            .max(next_end.saturating_sub(self.max_size));
        if floor >= end {
            return end;
        }

        let whole = members
            .iter()
            .rev()
            .take_while(|m| m.start >= floor)
            .last()
            .map(|m| m.start);

        match whole {
            Some(seed) if seed < end => seed,
            _ => ceil_char_boundary(text, floor).min(end),
        }
    }
}

/// Split `text` with the given limits.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_size, overlap)?.chunk(text))
}

/// Byte ranges of the paragraphs in `text`, excluding the breaks.
///
/// Always returns at least one range.
fn paragraph_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(PARAGRAPH_BREAK) {
        spans.push(start..idx);
        start = idx + PARAGRAPH_BREAK.len();
    }
    spans.push(start..text.len());
    spans
}

fn ceil_char_boundary(text: &str, index: usize) -> usize {
    (index..=text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len())
}
