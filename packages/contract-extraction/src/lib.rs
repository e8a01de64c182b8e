//! Contract Extraction Library
//!
//! Turns the text of a legal contract into a structured [`ContractDocument`]
//! (title, date, parties, amounts, categorized clauses, summary) by chaining
//! LLM calls.
//!
//! # Design
//!
//! - Long documents are split into overlapping, paragraph-aligned chunks
//! - Metadata is extracted per chunk and merged deterministically
//! - Six stages run in a fixed order, each fed the previous stage's output
//! - Any failure ends the run with the failing stage named
//! - The library handles mechanics; the model provider is behind [`AI`]
//!
//! # Usage
//!
//! ```rust,ignore
//! use contract_extraction::{Pipeline, PipelineConfig, PipelineOutcome};
//! use contract_extraction::testing::MockAI;
//!
//! let pipeline = Pipeline::with_config(MockAI::new(), PipelineConfig::default());
//!
//! match pipeline.run("msa.pdf", &text).await {
//!     PipelineOutcome::Success { document } => println!("{}", document.title),
//!     PipelineOutcome::Failure { stage, message } => eprintln!("{stage}: {message}"),
//! }
//! ```
//!
//! # Modules
//!
//! - [`traits`] - The `AI` backend abstraction
//! - [`types`] - Chunks, stage results, contract records and config
//! - [`pipeline`] - Chunker, invoker, merger and orchestrator
//! - [`text`] - Cleanup for extracted PDF text
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod error;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

// Re-export core types at crate root
pub use error::{ContractError, Result};
pub use pipeline::{
    chunk_text, merge_chunk_results, Chunker, ChunkResult, CombinedMetadata, Pipeline,
    StageInvoker,
};
pub use security::{AICredentials, SecretString};
pub use text::clean_text;
pub use traits::ai::AI;
pub use types::{
    chunk::Chunk,
    config::PipelineConfig,
    contract::{Clause, ClauseCategory, ClauseMetadata, ContractDocument, Party},
    outcome::{PipelineOutcome, PipelineReport, StageTiming},
    stage::{Phase, Stage, StageResult},
};
