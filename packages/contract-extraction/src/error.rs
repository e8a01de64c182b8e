//! Typed errors for the contract extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

use crate::types::stage::Stage;

/// Errors that can occur while running the contract pipeline.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Upstream text extraction produced nothing usable
    #[error("text extraction failed: {reason}")]
    ExtractionFailure { reason: String },

    /// Invalid chunking configuration
    #[error("invalid chunk config: overlap {overlap} must be smaller than max size {max_size}")]
    ChunkConfig { max_size: usize, overlap: usize },

    /// A stage call failed or returned something unusable
    #[error("{stage} stage failed: {message}")]
    StageInvocation { stage: Stage, message: String },

    /// Combined metadata is missing a required field after the merge
    #[error("merged metadata is inconsistent: {reason}")]
    MergeInconsistency { reason: String },

    /// Final document could not be assembled from the stage outputs
    #[error("assembly failed: {reason}")]
    Assembly { reason: String },

    /// AI backend unavailable or failed
    #[error("AI service error: {0}")]
    AI(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl ContractError {
    /// Shorthand for a stage failure.
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self::StageInvocation {
            stage,
            message: message.into(),
        }
    }

    /// Shorthand for an assembly failure.
    pub fn assembly(reason: impl Into<String>) -> Self {
        Self::Assembly {
            reason: reason.into(),
        }
    }
}

/// Result type alias for contract pipeline operations.
pub type Result<T> = std::result::Result<T, ContractError>;
