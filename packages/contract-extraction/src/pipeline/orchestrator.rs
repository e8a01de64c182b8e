//! Pipeline orchestrator - the main entry point for the contract library.
//!
//! Runs the fixed stage sequence over one document:
//!
//! ```text
//! START → METADATA → CLAUSE_EXTRACTION → CLASSIFICATION → ENTITY_ENRICHMENT
//!       → CLAUSE_IMPROVEMENT → SUMMARIZATION → ASSEMBLE → DONE
//! ```
//!
//! METADATA runs once per chunk with bounded concurrency; every later stage
//! runs once for the whole document and sees the previous stage's output in
//! its prompt. The first failure ends the run.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{ContractError, Result};
use crate::pipeline::{
    chunker::Chunker,
    invoker::StageInvoker,
    merge::{merge_chunk_results, ChunkResult, CombinedMetadata},
    prompts,
};
use crate::traits::ai::AI;
use crate::types::{
    chunk::Chunk,
    config::PipelineConfig,
    contract::{Clause, ContractDocument},
    outcome::{PipelineOutcome, PipelineReport, StageTiming},
    stage::{Phase, Stage, StageResult},
};

/// Runs contract text through every extraction stage.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::with_config(ai, PipelineConfig::default().with_concurrency_limit(8));
///
/// match pipeline.run("msa.pdf", &text).await {
///     PipelineOutcome::Success { document } => println!("{}", document.title),
///     PipelineOutcome::Failure { stage, message } => eprintln!("{stage}: {message}"),
/// }
/// ```
pub struct Pipeline<A: AI> {
    ai: A,
    config: PipelineConfig,
}

impl<A: AI> Pipeline<A> {
    /// Create a pipeline with default configuration.
    pub fn new(ai: A) -> Self {
        Self {
            ai,
            config: PipelineConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(ai: A, config: PipelineConfig) -> Self {
        Self { ai, config }
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get a reference to the AI backend.
    pub fn ai(&self) -> &A {
        &self.ai
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Extract a [`ContractDocument`] from `text`.
    pub async fn run(&self, source_name: &str, text: &str) -> PipelineOutcome {
        self.execute(source_name, text, None).await.outcome
    }

    /// Like [`run`](Self::run), failing with `Cancelled` once `token` fires.
    pub async fn run_with_cancel(
        &self,
        source_name: &str,
        text: &str,
        token: CancellationToken,
    ) -> PipelineOutcome {
        self.execute(source_name, text, Some(token)).await.outcome
    }

    /// Run and return the outcome together with run diagnostics.
    pub async fn run_report(&self, source_name: &str, text: &str) -> PipelineReport {
        self.execute(source_name, text, None).await
    }

    /// [`run_report`](Self::run_report) with cancellation.
    pub async fn run_report_with_cancel(
        &self,
        source_name: &str,
        text: &str,
        token: CancellationToken,
    ) -> PipelineReport {
        self.execute(source_name, text, Some(token)).await
    }

    async fn execute(
        &self,
        source_name: &str,
        text: &str,
        cancel: Option<CancellationToken>,
    ) -> PipelineReport {
        let run_id = Uuid::now_v7();
        let started_at = chrono::Utc::now();
        let text_hash = hash_text(text);
        let span = info_span!("contract_pipeline", %run_id, source = source_name);

        async move {
            info!(
                text_len = text.len(),
                text_hash = %text_hash,
                prompts = %prompts::prompt_set_hash(),
                "Starting contract pipeline"
            );

            let mut run = RunState::default();
            let outcome = match self.drive(source_name, text, cancel, &mut run).await {
                Ok(document) => {
                    info!(
                        clauses = document.clauses.len(),
                        parties = document.parties.len(),
                        "Contract pipeline complete"
                    );
                    PipelineOutcome::Success { document }
                }
                Err(e) => {
                    warn!(phase = %run.phase, error = %e, "Contract pipeline failed");
                    PipelineOutcome::from_error(run.phase, &e)
                }
            };

            PipelineReport {
                run_id,
                text_hash,
                started_at,
                chunk_count: run.chunk_count,
                stages: run.stages,
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Stage sequence
    // =========================================================================

    async fn drive(
        &self,
        source_name: &str,
        text: &str,
        cancel: Option<CancellationToken>,
        run: &mut RunState,
    ) -> Result<ContractDocument> {
        if text.trim().is_empty() {
            return Err(ContractError::ExtractionFailure {
                reason: "document text is empty".into(),
            });
        }

        run.phase = Phase::Chunking;
        self.config.validate()?;
        let chunks = Chunker::from_config(&self.config)?.chunk(text);
        run.chunk_count = chunks.len();
        info!(chunk_count = chunks.len(), "Document chunked");

        let mut invoker = StageInvoker::new(&self.ai, self.config.stage_timeout());
        if let Some(token) = &cancel {
            invoker = invoker.with_cancellation(token.clone());
        }
        let cancel = cancel.as_ref();

        // METADATA: one call per chunk, merged
        run.phase = Phase::Stage(Stage::Metadata);
        ensure_active(cancel)?;
        let started = Instant::now();
        let chunk_results = self.run_metadata(&invoker, &chunks).await;
        ensure_active(cancel)?;
        let combined = merge_chunk_results(chunk_results)?;
        combined.validate()?;
        run.record(Stage::Metadata, chunks.len(), started);
        let metadata_json = to_prompt_json(&combined)?;

        let extracted = self
            .call_stage(
                &invoker,
                run,
                Stage::ClauseExtraction,
                prompts::format_clause_extraction_prompt(&metadata_json),
                cancel,
            )
            .await?;
        let ledger = ClauseLedger::from_extraction(&extracted)?;

        let classified = self
            .call_stage(
                &invoker,
                run,
                Stage::Classification,
                prompts::format_classification_prompt(&to_prompt_json(&extracted)?),
                cancel,
            )
            .await?;
        ledger.check(Stage::Classification, &classified)?;

        let enriched = self
            .call_stage(
                &invoker,
                run,
                Stage::EntityEnrichment,
                prompts::format_entity_enrichment_prompt(&to_prompt_json(&classified)?),
                cancel,
            )
            .await?;
        ledger.check(Stage::EntityEnrichment, &enriched)?;

        let improved = self
            .call_stage(
                &invoker,
                run,
                Stage::ClauseImprovement,
                prompts::format_clause_improvement_prompt(&to_prompt_json(&enriched)?),
                cancel,
            )
            .await?;
        ledger.check(Stage::ClauseImprovement, &improved)?;

        let summarized = self
            .call_stage(
                &invoker,
                run,
                Stage::Summarization,
                prompts::format_summarization_prompt(&metadata_json, &to_prompt_json(&improved)?),
                cancel,
            )
            .await?;

        run.phase = Phase::Assemble;
        assemble(source_name, combined, &improved, &summarized)
    }

    /// Fan the metadata prompt out over every chunk.
    ///
    /// Always returns one result per chunk, in chunk order.
    async fn run_metadata(&self, invoker: &StageInvoker<'_, A>, chunks: &[Chunk]) -> Vec<ChunkResult> {
        let total = chunks.len();
        let limit = self.config.effective_concurrency();
        debug!(chunks = total, concurrency = limit, "Dispatching metadata calls");

        let calls = chunks.iter().map(|chunk| {
            let prompt = prompts::format_metadata_prompt(chunk, total);
            async move {
                let result = invoker.invoke(Stage::Metadata, &prompt).await;
                (chunk.sequence, result)
            }
        });

        let mut slots: Vec<Option<StageResult>> = vec![None; total];
        let mut completed = stream::iter(calls).buffer_unordered(limit);
        while let Some((sequence, result)) = completed.next().await {
            debug!(
                chunk = sequence,
                success = result.success,
                "Metadata chunk finished"
            );
            slots[sequence] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(sequence, slot)| {
                let result = slot.unwrap_or_else(|| {
                    StageResult::failed(Stage::Metadata, Value::Null, "no result recorded")
                });
                ChunkResult::new(sequence, result)
            })
            .collect()
    }

    /// Run one whole-document stage and return its structured output.
    async fn call_stage(
        &self,
        invoker: &StageInvoker<'_, A>,
        run: &mut RunState,
        stage: Stage,
        prompt: String,
        cancel: Option<&CancellationToken>,
    ) -> Result<Map<String, Value>> {
        run.phase = Phase::Stage(stage);
        ensure_active(cancel)?;

        info!(stage = %stage, agent = stage.agent_name(), "Running stage");
        let started = Instant::now();
        let result = invoker.invoke(stage, &prompt).await;
        ensure_active(cancel)?;

        let output = result.into_structured()?;
        run.record(stage, 1, started);
        Ok(output)
    }
}

/// Progress of one run, kept for the report.
#[derive(Debug)]
struct RunState {
    phase: Phase,
    chunk_count: usize,
    stages: Vec<StageTiming>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            phase: Phase::Input,
            chunk_count: 0,
            stages: Vec::new(),
        }
    }
}

impl RunState {
    fn record(&mut self, stage: Stage, calls: usize, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(stage = %stage, calls, duration_ms, "Stage complete");
        self.stages.push(StageTiming {
            stage,
            calls,
            duration_ms,
        });
    }
}

fn ensure_active(cancel: Option<&CancellationToken>) -> Result<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ContractError::Cancelled),
        _ => Ok(()),
    }
}

fn to_prompt_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

// =============================================================================
// Clause identity
// =============================================================================

/// Clause numbers produced by CLAUSE_EXTRACTION.
///
/// Later clause stages may rewrite or annotate clauses but may not drop one
/// or blank its text.
#[derive(Debug)]
struct ClauseLedger {
    numbers: Vec<u32>,
}

impl ClauseLedger {
    fn from_extraction(output: &Map<String, Value>) -> Result<Self> {
        let entries = clause_entries(Stage::ClauseExtraction, output)?;
        if let Some((number, _)) = entries.iter().find(|(_, has_text)| !has_text) {
            return Err(ContractError::stage(
                Stage::ClauseExtraction,
                format!("clause {} has no text", number),
            ));
        }

        let mut numbers: Vec<u32> = entries.into_iter().map(|(number, _)| number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        debug!(clauses = numbers.len(), "Clause ledger recorded");
        Ok(Self { numbers })
    }

    fn check(&self, stage: Stage, output: &Map<String, Value>) -> Result<()> {
        let entries = clause_entries(stage, output)?;
        let missing: Vec<String> = self
            .numbers
            .iter()
            .filter(|n| !entries.iter().any(|(number, has_text)| number == *n && *has_text))
            .map(|n| n.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ContractError::stage(
                stage,
                format!("dropped or emptied clause(s) {}", missing.join(", ")),
            ))
        }
    }
}

/// `(number, has_text)` for every entry of a stage's `clauses` list.
fn clause_entries(stage: Stage, output: &Map<String, Value>) -> Result<Vec<(u32, bool)>> {
    let Some(Value::Array(items)) = output.get("clauses") else {
        return Err(ContractError::stage(stage, "output has no clause list"));
    };

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let number = item
                .get("clause")
                .or_else(|| item.get("sequence_number"))
                .and_then(clause_number)
                .ok_or_else(|| {
                    ContractError::stage(stage, format!("clause entry {} has no number", idx))
                })?;
            let has_text = item
                .get("clause_text")
                .or_else(|| item.get("text"))
                .and_then(Value::as_str)
                .is_some_and(|t| !t.trim().is_empty());
            Ok((number, has_text))
        })
        .collect()
}

fn clause_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Assembly
// =============================================================================

#[derive(serde::Deserialize)]
struct ClauseList {
    clauses: Vec<Clause>,
}

/// Keys every improved clause must carry. The typed `Clause` tolerates their
/// absence for per-chunk metadata, so presence is checked here.
fn check_clause_fields(improved: &Map<String, Value>) -> Result<()> {
    let items = improved
        .get("clauses")
        .and_then(Value::as_array)
        .ok_or_else(|| ContractError::assembly("clause improvement output has no clause list"))?;

    for (index, item) in items.iter().enumerate() {
        let missing = |key: &str| {
            ContractError::assembly(format!(
                "clause {} from clause improvement is missing {}",
                index + 1,
                key
            ))
        };

        if item.get("clause").and_then(clause_number).is_none() {
            return Err(missing("clause"));
        }
        if !item
            .get("clause_category")
            .and_then(Value::as_str)
            .is_some_and(|c| !c.trim().is_empty())
        {
            return Err(missing("clause_category"));
        }
        if !item.get("related_dates").is_some_and(Value::is_array) {
            return Err(missing("related_dates"));
        }
        if !item
            .get("metadata")
            .and_then(|m| m.get("confidence_score"))
            .is_some_and(Value::is_number)
        {
            return Err(missing("metadata.confidence_score"));
        }
    }
    Ok(())
}

/// Build the final document. Required values are never defaulted.
fn assemble(
    source_name: &str,
    combined: CombinedMetadata,
    improved: &Map<String, Value>,
    summarized: &Map<String, Value>,
) -> Result<ContractDocument> {
    let title = combined
        .title
        .ok_or_else(|| ContractError::assembly("combined metadata has no contract title"))?;

    check_clause_fields(improved)?;
    let mut clauses = serde_json::from_value::<ClauseList>(Value::Object(improved.clone()))
        .map_err(|e| ContractError::assembly(format!("clause improvement output is malformed: {}", e)))?
        .clauses;
    for clause in &mut clauses {
        clause.normalize(Stage::ClauseImprovement);
    }
    clauses.sort_by_key(|c| c.sequence_number);

    let summary = summarized
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ContractError::assembly("summarization output has no summary"))?
        .to_string();

    Ok(ContractDocument {
        source_name: source_name.to_string(),
        title,
        effective_date: combined.effective_date,
        parties: combined.parties,
        clauses,
        summary,
        amounts: combined.amounts,
    })
}
