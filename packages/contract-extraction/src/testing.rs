//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the contract library
//! without making real AI calls.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{ContractError, Result};
use crate::traits::ai::AI;
use crate::types::stage::Stage;

/// A scripted response, optionally restricted to prompts containing a needle.
#[derive(Debug, Clone)]
struct Script {
    stage: Stage,
    needle: Option<String>,
    reply: Reply,
}

#[derive(Debug, Clone)]
enum Reply {
    Value(Value),
    Fail(String),
}

/// A mock AI implementation for testing.
///
/// Returns deterministic, configurable responses per stage. Scripts added
/// with a needle only apply when the prompt contains that text, which is how
/// tests address individual chunks of the metadata stage. Later scripts take
/// precedence over earlier ones.
#[derive(Default, Clone)]
pub struct MockAI {
    scripts: Vec<Script>,

    /// Artificial latency per stage
    delays: HashMap<Stage, Duration>,

    /// Latency for prompts containing a needle, checked before `delays`
    matching_delays: Vec<(Stage, String, Duration)>,

    /// Call tracking for assertions
    calls: Arc<Mutex<Vec<MockAICall>>>,
}

/// Record of a call made to the mock AI.
#[derive(Debug, Clone)]
pub struct MockAICall {
    pub stage: Stage,
    pub prompt: String,
}

impl MockAI {
    /// Create a new mock AI with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to every call for `stage` with `response`.
    pub fn with_response(mut self, stage: Stage, response: Value) -> Self {
        self.scripts.push(Script {
            stage,
            needle: None,
            reply: Reply::Value(response),
        });
        self
    }

    /// Respond with `response` when the prompt for `stage` contains `needle`.
    pub fn with_response_matching(
        mut self,
        stage: Stage,
        needle: impl Into<String>,
        response: Value,
    ) -> Self {
        self.scripts.push(Script {
            stage,
            needle: Some(needle.into()),
            reply: Reply::Value(response),
        });
        self
    }

    /// Fail every call for `stage`.
    pub fn with_failure(mut self, stage: Stage, message: impl Into<String>) -> Self {
        self.scripts.push(Script {
            stage,
            needle: None,
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Fail calls for `stage` whose prompt contains `needle`.
    pub fn with_failure_matching(
        mut self,
        stage: Stage,
        needle: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.scripts.push(Script {
            stage,
            needle: Some(needle.into()),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Sleep before answering calls for `stage`.
    pub fn with_delay(mut self, stage: Stage, delay: Duration) -> Self {
        self.delays.insert(stage, delay);
        self
    }

    /// Sleep before answering calls for `stage` whose prompt contains
    /// `needle`. Lets tests make individual chunks finish out of order.
    pub fn with_delay_matching(mut self, stage: Stage, needle: impl Into<String>, delay: Duration) -> Self {
        self.matching_delays.push((stage, needle.into(), delay));
        self
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockAICall> {
        self.lock_calls().clone()
    }

    /// Calls made for one stage, in order.
    pub fn calls_for(&self, stage: Stage) -> Vec<MockAICall> {
        self.lock_calls()
            .iter()
            .filter(|c| c.stage == stage)
            .cloned()
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.lock_calls().clear();
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<MockAICall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn delay_for(&self, stage: Stage, prompt: &str) -> Option<Duration> {
        self.matching_delays
            .iter()
            .rev()
            .find(|(s, needle, _)| *s == stage && prompt.contains(needle.as_str()))
            .map(|(_, _, delay)| *delay)
            .or_else(|| self.delays.get(&stage).copied())
    }

    fn reply_for(&self, stage: Stage, prompt: &str) -> Reply {
        self.scripts
            .iter()
            .rev()
            .filter(|s| s.stage == stage)
            .find(|s| s.needle.as_deref().map_or(true, |n| prompt.contains(n)))
            .map(|s| s.reply.clone())
            .unwrap_or_else(|| Reply::Value(default_response(stage)))
    }
}

/// Minimal well-formed output for a stage.
fn default_response(stage: Stage) -> Value {
    let clause = json!({
        "clause": 1,
        "clause_category": "Miscellaneous",
        "clause_text": "Mock clause.",
        "related_dates": [],
        "metadata": {"confidence_score": 0.9}
    });

    match stage {
        Stage::Metadata => json!({
            "contract_title": "Mock Agreement",
            "contract_date": null,
            "parties_involved": [],
            "clauses": [],
            "amounts": []
        }),
        Stage::ClauseExtraction
        | Stage::Classification
        | Stage::EntityEnrichment
        | Stage::ClauseImprovement => json!({ "clauses": [clause] }),
        Stage::Summarization => json!({ "summary": "Mock summary." }),
    }
}

#[async_trait]
impl AI for MockAI {
    async fn run_stage(&self, stage: Stage, prompt: &str) -> Result<Value> {
        self.lock_calls().push(MockAICall {
            stage,
            prompt: prompt.to_string(),
        });

        if let Some(delay) = self.delay_for(stage, prompt) {
            tokio::time::sleep(delay).await;
        }

        match self.reply_for(stage, prompt) {
            Reply::Value(value) => Ok(value),
            Reply::Fail(message) => Err(ContractError::AI(message.into())),
        }
    }
}
