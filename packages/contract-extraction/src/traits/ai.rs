//! AI trait for LLM operations.
//!
//! The pipeline needs exactly one capability from a model provider: run a
//! prompt for a given stage and hand back whatever JSON it produced. Shape
//! normalization happens in [`StageInvoker`](crate::pipeline::invoker::StageInvoker),
//! so implementations may return either the structured object itself or an
//! envelope with a nested `content` payload.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::stage::Stage;

/// AI trait for LLM operations.
///
/// Implementations wrap specific LLM providers (OpenAI, DeepSeek-compatible
/// gateways, etc.) and handle transport and authentication. They must not
/// retry on behalf of the pipeline, and they must not share mutable state
/// between calls: the metadata stage may call `run_stage` concurrently.
#[async_trait]
pub trait AI: Send + Sync {
    /// Run one stage prompt and return the raw response.
    ///
    /// The stage is passed so providers can pick a system prompt, a model,
    /// or a schema per stage.
    async fn run_stage(&self, stage: Stage, prompt: &str) -> Result<serde_json::Value>;
}

#[async_trait]
impl<T: AI + ?Sized> AI for &T {
    async fn run_stage(&self, stage: Stage, prompt: &str) -> Result<serde_json::Value> {
        (**self).run_stage(stage, prompt).await
    }
}

#[async_trait]
impl<T: AI + ?Sized> AI for std::sync::Arc<T> {
    async fn run_stage(&self, stage: Stage, prompt: &str) -> Result<serde_json::Value> {
        (**self).run_stage(stage, prompt).await
    }
}
