//! Pipeline outcome and run report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ContractError;
use crate::types::{
    contract::ContractDocument,
    stage::{Phase, Stage},
};

/// Terminal result of running the full stage sequence over one document.
///
/// Serializes as `{"status": "success", "document": {...}}` or
/// `{"status": "failure", "stage": "...", "message": "..."}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Success { document: ContractDocument },
    Failure { stage: Phase, message: String },
}

impl PipelineOutcome {
    /// Build a failure outcome from an error raised in `phase`.
    ///
    /// Stage errors carry their own stage, which takes precedence.
    pub fn from_error(phase: Phase, error: &ContractError) -> Self {
        let stage = match error {
            ContractError::StageInvocation { stage, .. } => Phase::Stage(*stage),
            ContractError::ExtractionFailure { .. } => Phase::Input,
            ContractError::ChunkConfig { .. } => Phase::Chunking,
            ContractError::MergeInconsistency { .. } => Phase::Stage(Stage::Metadata),
            ContractError::Assembly { .. } => Phase::Assemble,
            _ => phase,
        };
        PipelineOutcome::Failure {
            stage,
            message: error.to_string(),
        }
    }

    /// Whether the run produced a document.
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success { .. })
    }

    /// The document, if the run succeeded.
    pub fn document(&self) -> Option<&ContractDocument> {
        match self {
            PipelineOutcome::Success { document } => Some(document),
            PipelineOutcome::Failure { .. } => None,
        }
    }

    /// Take the document, if the run succeeded.
    pub fn into_document(self) -> Option<ContractDocument> {
        match self {
            PipelineOutcome::Success { document } => Some(document),
            PipelineOutcome::Failure { .. } => None,
        }
    }

    /// The failing phase, if the run failed.
    pub fn failed_stage(&self) -> Option<Phase> {
        match self {
            PipelineOutcome::Success { .. } => None,
            PipelineOutcome::Failure { stage, .. } => Some(*stage),
        }
    }
}

/// Timing for one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    /// Number of calls made (chunk count for the metadata stage)
    pub calls: usize,
    pub duration_ms: u64,
}

/// Diagnostics for one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Identifier attached to the run's tracing span
    pub run_id: Uuid,

    /// SHA-256 of the input text
    pub text_hash: String,

    pub started_at: DateTime<Utc>,

    pub chunk_count: usize,

    /// Stages that completed, in order
    pub stages: Vec<StageTiming>,

    pub outcome: PipelineOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_with_status_tag() {
        let outcome = PipelineOutcome::Failure {
            stage: Phase::Stage(Stage::Classification),
            message: "boom".into(),
        };
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["status"], "failure");
        assert_eq!(value["stage"], "classification");
        assert_eq!(value["message"], "boom");
    }

    #[test]
    fn test_from_error_uses_error_stage() {
        let err = ContractError::stage(Stage::Summarization, "timeout");
        let outcome = PipelineOutcome::from_error(Phase::Assemble, &err);
        assert_eq!(outcome.failed_stage(), Some(Phase::Stage(Stage::Summarization)));
    }

    #[test]
    fn test_from_error_falls_back_to_phase() {
        let outcome = PipelineOutcome::from_error(Phase::Stage(Stage::Metadata), &ContractError::Cancelled);
        assert_eq!(outcome.failed_stage(), Some(Phase::Stage(Stage::Metadata)));
        assert!(!outcome.is_success());
    }
}
