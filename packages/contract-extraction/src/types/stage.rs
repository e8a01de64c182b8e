//! Stage identifiers and per-call results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{ContractError, Result};

/// One LLM-backed step of the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Title, date, parties, amounts and raw clauses (runs per chunk)
    Metadata,
    /// Numbered clause list from the combined metadata
    ClauseExtraction,
    /// Category assignment for each clause
    Classification,
    /// Dates, amounts and parties per clause
    EntityEnrichment,
    /// Improved wording for each clause
    ClauseImprovement,
    /// Whole-contract summary
    Summarization,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 6] = [
        Stage::Metadata,
        Stage::ClauseExtraction,
        Stage::Classification,
        Stage::EntityEnrichment,
        Stage::ClauseImprovement,
        Stage::Summarization,
    ];

    /// Stable snake_case name.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::ClauseExtraction => "clause_extraction",
            Stage::Classification => "classification",
            Stage::EntityEnrichment => "entity_enrichment",
            Stage::ClauseImprovement => "clause_improvement",
            Stage::Summarization => "summarization",
        }
    }

    /// Human-readable agent name, recorded as `extracted_by` on clauses.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Stage::Metadata => "Document Parser",
            Stage::ClauseExtraction => "Clause Extractor",
            Stage::Classification => "Clause Classifier",
            Stage::EntityEnrichment => "NER Processor",
            Stage::ClauseImprovement => "Clause Generator",
            Stage::Summarization => "Contract Summarizer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where in a run a failure happened.
///
/// A superset of [`Stage`]: it also covers the steps around the LLM calls.
/// Serializes as its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Validating the input text
    Input,
    /// Splitting the text into chunks
    Chunking,
    /// One of the LLM stages (metadata failures include the merge)
    Stage(Stage),
    /// Building the final document
    Assemble,
}

impl Phase {
    /// Stable snake_case name.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Input => "input",
            Phase::Chunking => "chunking",
            Phase::Stage(stage) => stage.name(),
            Phase::Assemble => "assemble",
        }
    }
}

impl From<Stage> for Phase {
    fn from(stage: Stage) -> Self {
        Phase::Stage(stage)
    }
}

impl Serialize for Phase {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one stage invocation.
///
/// Produced once per call and never mutated afterwards. On success,
/// `structured_output` is always a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Which stage produced this result
    pub stage: Stage,

    /// Backend response before normalization (`Null` if the call failed)
    pub raw_output: Value,

    /// Normalized mapping, present only on success
    pub structured_output: Option<Map<String, Value>>,

    /// Whether the call produced a usable mapping
    pub success: bool,

    /// Failure description, present only on failure
    pub error: Option<String>,
}

impl StageResult {
    /// A successful result.
    pub fn succeeded(stage: Stage, raw_output: Value, structured: Map<String, Value>) -> Self {
        Self {
            stage,
            raw_output,
            structured_output: Some(structured),
            success: true,
            error: None,
        }
    }

    /// A failed result.
    pub fn failed(stage: Stage, raw_output: Value, error: impl Into<String>) -> Self {
        Self {
            stage,
            raw_output,
            structured_output: None,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Stage name as a string.
    pub fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    /// Borrow the mapping, or turn the failure into an error.
    pub fn structured(&self) -> Result<&Map<String, Value>> {
        match (&self.structured_output, self.success) {
            (Some(map), true) => Ok(map),
            _ => Err(ContractError::stage(
                self.stage,
                self.error.clone().unwrap_or_else(|| "no structured output".into()),
            )),
        }
    }

    /// Take the mapping, or turn the failure into an error.
    pub fn into_structured(self) -> Result<Map<String, Value>> {
        match (self.structured_output, self.success) {
            (Some(map), true) => Ok(map),
            _ => Err(ContractError::stage(
                self.stage,
                self.error.unwrap_or_else(|| "no structured output".into()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ALL[0], Stage::Metadata);
        assert_eq!(Stage::ALL[Stage::ALL.len() - 1], Stage::Summarization);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::from(Stage::EntityEnrichment).name(), "entity_enrichment");
        assert_eq!(Phase::Assemble.to_string(), "assemble");
    }

    #[test]
    fn test_failed_result_into_error() {
        let result = StageResult::failed(Stage::Summarization, Value::Null, "timeout");
        let err = result.into_structured().unwrap_err();
        assert!(matches!(
            err,
            ContractError::StageInvocation { stage: Stage::Summarization, .. }
        ));
    }

    #[test]
    fn test_succeeded_result() {
        let mut map = Map::new();
        map.insert("summary".into(), json!("ok"));
        let result = StageResult::succeeded(Stage::Summarization, json!({"summary": "ok"}), map);
        assert!(result.success);
        assert_eq!(result.stage_name(), "summarization");
        assert_eq!(result.structured().unwrap()["summary"], "ok");
    }
}
