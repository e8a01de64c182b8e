//! Integration tests for the full contract pipeline.
//!
//! These drive `Pipeline` through its public API with a scripted `MockAI`:
//! 1. Chunk the text
//! 2. Extract and merge per-chunk metadata
//! 3. Run the clause and summary stages
//! 4. Assemble or fail with the right stage

use contract_extraction::{
    testing::MockAI, Party, Phase, Pipeline, PipelineConfig, PipelineOutcome, Stage,
};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const FIRST: &str = "The parties agree to the terms.";
const SECOND: &str = "Payment is due in thirty days.";

fn contract_text() -> String {
    format!("{FIRST}\n\n{SECOND}")
}

/// Two chunks at this size.
fn small_chunks() -> PipelineConfig {
    PipelineConfig::default()
        .with_max_chunk_size(50)
        .with_chunk_overlap(10)
}

fn clause_list(extra: Value) -> Value {
    let mut first = json!({"clause": 1, "section_name": "AGREEMENT", "clause_text": FIRST});
    let mut second = json!({"clause": 2, "section_name": "PAYMENT", "clause_text": SECOND});
    if let (Some(a), Some(b), Some(extra)) = (first.as_object_mut(), second.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            a.insert(k.clone(), v.clone());
            b.insert(k.clone(), v.clone());
        }
    }
    json!({ "clauses": [first, second] })
}

/// A mock that completes every stage for the two-chunk contract.
fn scripted_ai() -> MockAI {
    MockAI::new()
        .with_response_matching(
            Stage::Metadata,
            "The parties agree",
            json!({
                "contract_title": "Services Agreement",
                "contract_date": null,
                "parties_involved": [{"party_name": "Acme Corp", "role": "Vendor"}],
                "amounts": ["$5,000"]
            }),
        )
        .with_response_matching(
            Stage::Metadata,
            "Payment is due",
            json!({
                "contract_title": "Payment Schedule",
                "contract_date": "2025-03-01",
                "parties_involved": [
                    {"party_name": "Acme Corp", "role": "Vendor"},
                    {"party_name": "Beta LLC", "role": "Client"}
                ],
                "amounts": ["$5,000", 100]
            }),
        )
        .with_response(Stage::ClauseExtraction, clause_list(json!({})))
        .with_response(
            Stage::Classification,
            clause_list(json!({"clause_category": "Financial Terms"})),
        )
        .with_response(
            Stage::EntityEnrichment,
            clause_list(json!({"clause_category": "Financial Terms", "related_dates": ["2025-03-01"]})),
        )
        .with_response(
            Stage::ClauseImprovement,
            // Envelope with fenced JSON text, as chat backends return it
            json!({
                "content": format!(
                    "```json\n{}\n```",
                    clause_list(json!({
                        "clause_category": "Financial Terms",
                        "related_dates": ["2025-03-01"],
                        "improved_clause_text": "Improved.",
                        "metadata": {"confidence_score": 1.4}
                    }))
                )
            }),
        )
        .with_response(
            Stage::Summarization,
            json!({"summary": "Acme provides services to Beta for $5,000."}),
        )
}

#[tokio::test]
async fn test_two_chunk_contract_end_to_end() {
    let pipeline = Pipeline::with_config(scripted_ai(), small_chunks());
    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    let document = match &outcome {
        PipelineOutcome::Success { document } => document,
        PipelineOutcome::Failure { stage, message } => panic!("failed at {stage}: {message}"),
    };

    // First chunk's title wins; second chunk supplies the date
    assert_eq!(document.source_name, "services.pdf");
    assert_eq!(document.title, "Services Agreement");
    assert_eq!(document.effective_date.as_deref(), Some("2025-03-01"));

    // Acme appears in both chunks but only once in the document
    assert_eq!(document.parties.len(), 2);
    assert_eq!(
        document.parties.get_index(0),
        Some(&Party::new("Acme Corp", "Vendor"))
    );
    let amounts: Vec<_> = document.amounts.iter().map(String::as_str).collect();
    assert_eq!(amounts, vec!["$5,000", "100"]);

    // Clauses come from the improvement stage, in order, normalized
    assert_eq!(document.clauses.len(), 2);
    assert_eq!(document.clauses[0].text, FIRST);
    assert_eq!(document.clauses[1].sequence_number, 2);
    assert_eq!(document.clauses[1].improved_text.as_deref(), Some("Improved."));
    assert_eq!(document.clauses[1].metadata.confidence_score, 1.0);
    assert_eq!(document.summary, "Acme provides services to Beta for $5,000.");

    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], "success");
    assert_eq!(value["document"]["pdf_name"], "services.pdf");
    assert_eq!(value["document"]["parties_involved"][0]["party_name"], "Acme Corp");
    assert_eq!(value["document"]["clauses"][0]["clause_category"], "Financial Terms");
}

#[tokio::test]
async fn test_each_stage_sees_previous_output() {
    let pipeline = Pipeline::with_config(scripted_ai(), small_chunks());
    assert!(pipeline.run("services.pdf", &contract_text()).await.is_success());

    let ai = pipeline.ai();
    let metadata = ai.calls_for(Stage::Metadata);
    assert_eq!(metadata.len(), 2);
    assert!(metadata.iter().any(|c| c.prompt.contains("chunk 1 of 2")));
    assert!(metadata.iter().any(|c| c.prompt.contains("chunk 2 of 2")));

    // Combined metadata feeds clause extraction
    let extraction = &ai.calls_for(Stage::ClauseExtraction)[0].prompt;
    assert!(extraction.contains("Services Agreement"));
    assert!(extraction.contains("Beta LLC"));

    // Classified output feeds enrichment
    let enrichment = &ai.calls_for(Stage::EntityEnrichment)[0].prompt;
    assert!(enrichment.contains("Financial Terms"));

    // Summarization gets both metadata and improved clauses
    let summary = &ai.calls_for(Stage::Summarization)[0].prompt;
    assert!(summary.contains("Services Agreement"));
    assert!(summary.contains("Improved."));
}

#[tokio::test]
async fn test_failed_chunk_fails_metadata_stage() {
    let ai = scripted_ai().with_failure_matching(Stage::Metadata, "Payment is due", "rate limited");
    let pipeline = Pipeline::with_config(ai, small_chunks());

    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    match &outcome {
        PipelineOutcome::Failure { stage, message } => {
            assert_eq!(*stage, Phase::Stage(Stage::Metadata));
            assert!(message.contains("chunk 1: "));
            assert!(message.contains("rate limited"));
        }
        PipelineOutcome::Success { .. } => panic!("expected failure"),
    }

    // The healthy chunk still ran; nothing after METADATA did
    assert_eq!(pipeline.ai().calls_for(Stage::Metadata).len(), 2);
    assert!(pipeline.ai().calls_for(Stage::ClauseExtraction).is_empty());
}

#[tokio::test]
async fn test_dropped_clause_fails_classification() {
    let ai = scripted_ai().with_response(
        Stage::Classification,
        json!({"clauses": [{"clause": 1, "clause_text": FIRST}]}),
    );
    let pipeline = Pipeline::with_config(ai, small_chunks());

    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    assert_eq!(outcome.failed_stage(), Some(Phase::Stage(Stage::Classification)));
    assert!(pipeline.ai().calls_for(Stage::EntityEnrichment).is_empty());
}

#[tokio::test]
async fn test_missing_title_is_merge_inconsistency() {
    let ai = MockAI::new().with_response(Stage::Metadata, json!({"contract_title": null}));
    let pipeline = Pipeline::new(ai);

    let outcome = pipeline.run("untitled.pdf", "Some clause text.").await;

    match outcome {
        PipelineOutcome::Failure { stage, message } => {
            assert_eq!(stage, Phase::Stage(Stage::Metadata));
            assert!(message.contains("title"));
        }
        PipelineOutcome::Success { .. } => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_missing_summary_fails_assembly() {
    let ai = scripted_ai().with_response(Stage::Summarization, json!({"overview": "wrong key"}));
    let pipeline = Pipeline::with_config(ai, small_chunks());

    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    assert_eq!(outcome.failed_stage(), Some(Phase::Assemble));
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value["status"], "failure");
    assert_eq!(value["stage"], "assemble");
}

#[tokio::test]
async fn test_improved_clause_without_category_fails_assembly() {
    let ai = scripted_ai().with_response(
        Stage::ClauseImprovement,
        clause_list(json!({"related_dates": [], "metadata": {"confidence_score": 0.9}})),
    );
    let pipeline = Pipeline::with_config(ai, small_chunks());

    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    match outcome {
        PipelineOutcome::Failure { stage, message } => {
            assert_eq!(stage, Phase::Assemble);
            assert!(message.contains("clause_category"));
        }
        PipelineOutcome::Success { .. } => panic!("expected assembly failure"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_chunk_wins_when_it_finishes_last() {
    // Chunk 0 answers well after chunk 1
    let ai = scripted_ai().with_delay_matching(
        Stage::Metadata,
        "The parties agree",
        Duration::from_secs(10),
    );
    let pipeline = Pipeline::with_config(ai, small_chunks());

    let document = pipeline
        .run("services.pdf", &contract_text())
        .await
        .into_document()
        .expect("run should succeed");

    assert_eq!(document.title, "Services Agreement");
    assert_eq!(document.effective_date.as_deref(), Some("2025-03-01"));
    let amounts: Vec<_> = document.amounts.iter().map(String::as_str).collect();
    assert_eq!(amounts, vec!["$5,000", "100"]);
    assert_eq!(
        document.parties.get_index(1),
        Some(&Party::new("Beta LLC", "Client"))
    );
}

#[tokio::test]
async fn test_bad_chunk_config_fails_before_any_call() {
    let config = PipelineConfig::default()
        .with_max_chunk_size(100)
        .with_chunk_overlap(100);
    let pipeline = Pipeline::with_config(scripted_ai(), config);

    let outcome = pipeline.run("services.pdf", &contract_text()).await;

    assert_eq!(outcome.failed_stage(), Some(Phase::Chunking));
    assert!(pipeline.ai().calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_stage_times_out() {
    let ai = scripted_ai().with_delay(Stage::Summarization, Duration::from_secs(600));
    let config = small_chunks().with_stage_timeout(Duration::from_secs(5));
    let pipeline = Pipeline::with_config(ai, config);

    let report = pipeline.run_report("services.pdf", &contract_text()).await;

    match &report.outcome {
        PipelineOutcome::Failure { stage, message } => {
            assert_eq!(*stage, Phase::Stage(Stage::Summarization));
            assert!(message.contains("timed out"));
        }
        PipelineOutcome::Success { .. } => panic!("expected timeout"),
    }
    // Every stage before the slow one completed
    assert_eq!(report.stages.len(), 5);
    assert_eq!(report.chunk_count, 2);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let pipeline = Pipeline::with_config(scripted_ai(), small_chunks());
    let token = CancellationToken::new();
    token.cancel();

    let outcome = pipeline
        .run_with_cancel("services.pdf", &contract_text(), token)
        .await;

    match outcome {
        PipelineOutcome::Failure { stage, message } => {
            assert_eq!(stage, Phase::Stage(Stage::Metadata));
            assert_eq!(message, "operation cancelled");
        }
        PipelineOutcome::Success { .. } => panic!("expected cancellation"),
    }
    assert!(pipeline.ai().calls().is_empty());
}

#[tokio::test]
async fn test_concurrency_limit_of_one_still_merges_in_order() {
    let ai = scripted_ai().with_delay(Stage::Metadata, Duration::from_millis(5));
    let config = small_chunks().with_concurrency_limit(1);
    let pipeline = Pipeline::with_config(ai, config);

    let document = pipeline
        .run("services.pdf", &contract_text())
        .await
        .into_document()
        .expect("run should succeed");

    assert_eq!(document.title, "Services Agreement");
}
