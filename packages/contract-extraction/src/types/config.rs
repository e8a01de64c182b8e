//! Configuration types for the contract pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ContractError, Result};

/// Configuration for a pipeline run.
///
/// Passed explicitly into [`Pipeline::with_config`](crate::Pipeline::with_config);
/// the pipeline keeps no process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum chunk size in bytes.
    ///
    /// A single paragraph longer than this still becomes one (oversized)
    /// chunk. Default: 2000.
    pub max_chunk_size: usize,

    /// Maximum bytes repeated from the end of one chunk at the start of the
    /// next. Must be smaller than `max_chunk_size`. Default: 500.
    pub chunk_overlap: usize,

    /// Timeout for each stage call, in seconds. Default: 60.
    pub stage_timeout_seconds: u64,

    /// Maximum metadata calls in flight during the per-chunk fan-out.
    ///
    /// 1 runs the chunks sequentially. Default: 4.
    pub concurrency_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 2000,
            chunk_overlap: 500,
            stage_timeout_seconds: 60,
            concurrency_limit: 4,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum chunk size.
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Set the chunk overlap.
    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    /// Set the per-stage timeout.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_seconds = timeout.as_secs().max(1);
        self
    }

    /// Set the chunk fan-out concurrency.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Per-stage timeout as a `Duration`.
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }

    /// Fan-out width, never below 1.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }

    /// Check the values that would make a run meaningless.
    ///
    /// Chunk geometry is checked separately by the chunker so that
    /// chunking errors keep their own error kind.
    pub fn validate(&self) -> Result<()> {
        if self.stage_timeout_seconds == 0 {
            return Err(ContractError::Config(
                "stage_timeout_seconds must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
