//! Chunk-result merger - fold per-chunk metadata into one document view.
//!
//! Chunks are merged in document order regardless of completion order.
//! Scalars take the first non-empty value, sets are unioned and clauses are
//! concatenated then renumbered. A single failed chunk fails the whole merge.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ContractError, Result};
use crate::types::contract::{lenient_strings, Clause, Party};
use crate::types::stage::{Stage, StageResult};

/// The metadata-stage result for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    /// Sequence of the chunk the result belongs to
    pub sequence: usize,
    pub result: StageResult,
}

impl ChunkResult {
    pub fn new(sequence: usize, result: StageResult) -> Self {
        Self { sequence, result }
    }
}

/// Shape of a metadata-stage response for one chunk.
///
/// Every field is optional: a chunk may legitimately contain no title or
/// no parties.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub contract_title: Option<String>,

    #[serde(default)]
    pub contract_date: Option<String>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub parties_involved: Vec<Party>,

    #[serde(default, deserialize_with = "nullable_list")]
    pub clauses: Vec<Clause>,

    #[serde(default, deserialize_with = "lenient_strings")]
    pub amounts: Vec<String>,
}

impl MetadataResponse {
    /// Parse a chunk's structured output.
    ///
    /// Models sometimes wrap the record as `{"status": ..., "document": {...}}`;
    /// the inner document is used in that case.
    pub fn from_structured(map: &Map<String, Value>) -> serde_json::Result<Self> {
        let target = match map.get("document") {
            Some(Value::Object(inner)) if !map.contains_key("contract_title") => inner,
            _ => map,
        };
        serde_json::from_value(Value::Object(target.clone()))
    }
}

fn nullable_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Document-level metadata combined from every chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombinedMetadata {
    #[serde(rename = "contract_title")]
    pub title: Option<String>,

    #[serde(rename = "contract_date")]
    pub effective_date: Option<String>,

    #[serde(rename = "parties_involved")]
    pub parties: IndexSet<Party>,

    pub clauses: Vec<Clause>,

    pub amounts: IndexSet<String>,
}

impl CombinedMetadata {
    /// Check that the fields later stages rely on are present.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_none() {
            return Err(ContractError::MergeInconsistency {
                reason: "no chunk produced a contract title".into(),
            });
        }
        Ok(())
    }

    /// Fold one chunk's response in. Callers must apply chunks in order.
    fn absorb(&mut self, response: MetadataResponse) {
        if self.title.is_none() {
            self.title = non_empty(response.contract_title);
        }
        if self.effective_date.is_none() {
            self.effective_date = non_empty(response.contract_date);
        }

        self.parties.extend(
            response
                .parties_involved
                .iter()
                .map(Party::normalized)
                .filter(|p| !p.party_name.is_empty()),
        );

        self.clauses.extend(response.clauses);

        self.amounts.extend(response.amounts);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Merge per-chunk metadata results into one [`CombinedMetadata`].
///
/// Fails if any chunk failed (naming every failed chunk) or returned output
/// that does not parse as metadata. Merging is deterministic: the same
/// results in any arrival order produce the same value.
pub fn merge_chunk_results(mut results: Vec<ChunkResult>) -> Result<CombinedMetadata> {
    results.sort_by_key(|r| r.sequence);

    let failed: Vec<String> = results
        .iter()
        .filter(|r| !r.result.success)
        .map(|r| {
            format!(
                "chunk {}: {}",
                r.sequence,
                r.result.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();
    if !failed.is_empty() {
        return Err(ContractError::stage(
            Stage::Metadata,
            format!("{} chunk(s) failed ({})", failed.len(), failed.join("; ")),
        ));
    }

    let mut combined = CombinedMetadata::default();
    for chunk in &results {
        let map = chunk.result.structured()?;
        let response = MetadataResponse::from_structured(map).map_err(|e| {
            ContractError::stage(
                Stage::Metadata,
                format!("chunk {} returned malformed metadata: {}", chunk.sequence, e),
            )
        })?;
        combined.absorb(response);
    }

    for (idx, clause) in combined.clauses.iter_mut().enumerate() {
        clause.sequence_number = idx as u32 + 1;
        clause.normalize(Stage::Metadata);
    }

    debug!(
        chunks = results.len(),
        parties = combined.parties.len(),
        clauses = combined.clauses.len(),
        amounts = combined.amounts.len(),
        has_title = combined.title.is_some(),
        "Merged chunk metadata"
    );

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(sequence: usize, output: Value) -> ChunkResult {
        let map = output.as_object().cloned().unwrap();
        ChunkResult::new(sequence, StageResult::succeeded(Stage::Metadata, output, map))
    }

    fn failed_chunk(sequence: usize, error: &str) -> ChunkResult {
        ChunkResult::new(sequence, StageResult::failed(Stage::Metadata, Value::Null, error))
    }

    #[test]
    fn test_first_non_empty_title_wins_in_chunk_order() {
        let results = vec![
            chunk(2, json!({"contract_title": "Third"})),
            chunk(0, json!({"contract_title": "  "})),
            chunk(1, json!({"contract_title": "Second", "contract_date": "2025-03-01"})),
        ];

        let combined = merge_chunk_results(results).unwrap();
        assert_eq!(combined.title.as_deref(), Some("Second"));
        assert_eq!(combined.effective_date.as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn test_party_seen_in_every_chunk_appears_once() {
        let acme = json!({"party_name": "Acme Corp", "role": "Vendor"});
        let results = vec![
            chunk(0, json!({"contract_title": "MSA", "parties_involved": [acme.clone()]})),
            chunk(1, json!({"parties_involved": [acme.clone()]})),
            chunk(2, json!({"parties_involved": [acme, {"party_name": "Acme Corp", "role": "Client"}]})),
        ];

        let combined = merge_chunk_results(results).unwrap();
        assert_eq!(combined.parties.len(), 2);
        assert!(combined.parties.contains(&Party::new("Acme Corp", "Vendor")));
        assert!(combined.parties.contains(&Party::new("Acme Corp", "Client")));
    }

    #[test]
    fn test_clauses_follow_chunk_order_and_are_renumbered() {
        let results = vec![
            chunk(1, json!({"clauses": [{"clause": 1, "clause_text": "C"}]})),
            chunk(0, json!({
                "contract_title": "MSA",
                "clauses": [
                    {"clause": 7, "clause_text": "A"},
                    {"clause": 3, "clause_text": "B"}
                ]
            })),
        ];

        let combined = merge_chunk_results(results).unwrap();
        let texts: Vec<_> = combined.clauses.iter().map(|c| c.text.as_str()).collect();
        let numbers: Vec<_> = combined.clauses.iter().map(|c| c.sequence_number).collect();
        assert_eq!(texts, vec!["A", "B", "C"]);
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(
            combined.clauses[0].metadata.extracted_by.as_deref(),
            Some(Stage::Metadata.agent_name())
        );
    }

    #[test]
    fn test_amounts_union_accepts_numbers() {
        let results = vec![
            chunk(0, json!({"contract_title": "MSA", "amounts": ["$50,000", 100]})),
            chunk(1, json!({"amounts": ["$50,000", null]})),
        ];

        let combined = merge_chunk_results(results).unwrap();
        let amounts: Vec<_> = combined.amounts.iter().cloned().collect();
        assert_eq!(amounts, vec!["$50,000".to_string(), "100".to_string()]);
    }

    #[test]
    fn test_merge_is_idempotent_over_duplicate_inputs() {
        let output = json!({
            "contract_title": "MSA",
            "parties_involved": [{"party_name": "Acme", "role": "Vendor"}],
            "amounts": ["$10"]
        });

        let once = merge_chunk_results(vec![chunk(0, output.clone())]).unwrap();
        let twice = merge_chunk_results(vec![chunk(0, output.clone()), chunk(0, output)]).unwrap();

        assert_eq!(once.title, twice.title);
        assert_eq!(once.parties, twice.parties);
        assert_eq!(once.amounts, twice.amounts);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let a = chunk(0, json!({"contract_title": "A", "amounts": ["1"]}));
        let b = chunk(1, json!({"contract_title": "B", "amounts": ["2"]}));

        let forward = merge_chunk_results(vec![a.clone(), b.clone()]).unwrap();
        let reverse = merge_chunk_results(vec![b, a]).unwrap();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_failed_chunks_are_all_named() {
        let results = vec![
            chunk(0, json!({"contract_title": "MSA"})),
            failed_chunk(1, "timed out"),
            failed_chunk(3, "rate limited"),
            chunk(2, json!({})),
        ];

        let err = merge_chunk_results(results).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ContractError::StageInvocation { stage: Stage::Metadata, .. }));
        assert!(message.contains("chunk 1: timed out"));
        assert!(message.contains("chunk 3: rate limited"));
    }

    #[test]
    fn test_malformed_chunk_fails_merge() {
        let results = vec![chunk(0, json!({"parties_involved": "Acme"}))];
        let err = merge_chunk_results(results).unwrap_err();
        assert!(err.to_string().contains("chunk 0 returned malformed metadata"));
    }

    #[test]
    fn test_document_envelope_is_accepted() {
        let results = vec![chunk(0, json!({"status": "success", "document": {"contract_title": "Wrapped"}}))];
        let combined = merge_chunk_results(results).unwrap();
        assert_eq!(combined.title.as_deref(), Some("Wrapped"));
    }

    #[test]
    fn test_validate_requires_title() {
        let combined = merge_chunk_results(vec![chunk(0, json!({"contract_date": "2025-01-01"}))]).unwrap();
        assert!(matches!(
            combined.validate(),
            Err(ContractError::MergeInconsistency { .. })
        ));
    }
}
