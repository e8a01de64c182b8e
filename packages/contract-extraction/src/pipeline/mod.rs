//! Contract pipeline - chunking, stage invocation, merging and orchestration.
//!
//! The pipeline orchestrates:
//! - Chunking (paragraph-aligned, overlapping)
//! - Per-chunk metadata extraction with bounded concurrency
//! - Merging chunk results into document metadata
//! - The whole-document clause and summary stages
//! - Assembly of the final document

pub mod chunker;
pub mod invoker;
pub mod merge;
pub mod orchestrator;
pub mod prompts;

pub use chunker::{chunk_text, Chunker, PARAGRAPH_BREAK};
pub use invoker::{normalize_response, Payload, StageInvoker};
pub use merge::{merge_chunk_results, ChunkResult, CombinedMetadata, MetadataResponse};
pub use orchestrator::Pipeline;
pub use prompts::{
    format_classification_prompt, format_clause_extraction_prompt,
    format_clause_improvement_prompt, format_entity_enrichment_prompt, format_metadata_prompt,
    format_summarization_prompt, prompt_set_hash,
};
