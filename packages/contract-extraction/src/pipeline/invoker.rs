//! Stage invoker - one guarded AI call per stage, normalized into a [`StageResult`].
//!
//! Backends disagree on response shape. Some return the structured object
//! directly, some wrap it in an envelope with a `content` key, and some hand
//! back the model's text verbatim (occasionally inside a markdown code
//! fence). All of that is resolved here so later steps only ever see a JSON
//! object or a failed result.

use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::traits::ai::AI;
use crate::types::stage::{Stage, StageResult};

/// Envelope key some backends use for the actual payload.
const CONTENT_KEY: &str = "content";

/// A backend response, with or without its envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The payload was nested under `content`
    Unwrapped(Value),
    /// The response was the payload
    Raw(Value),
}

impl Payload {
    /// Strip a `content` envelope if present.
    pub fn from_response(response: &Value) -> Self {
        match response.get(CONTENT_KEY) {
            Some(inner) => Payload::Unwrapped(inner.clone()),
            None => Payload::Raw(response.clone()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Unwrapped(value) | Payload::Raw(value) => value,
        }
    }

    /// Resolve the payload into a JSON object.
    ///
    /// Strings are parsed as JSON after stripping a code fence; anything
    /// that is still not an object is rejected.
    pub fn into_object(self) -> Result<Map<String, Value>, String> {
        let value = match self.into_value() {
            Value::String(text) => serde_json::from_str(strip_code_fence(&text))
                .map_err(|e| format!("response text is not valid JSON: {}", e))?,
            other => other,
        };

        match value {
            Value::Object(map) => Ok(map),
            other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        }
    }
}

/// Normalize a raw backend response into the stage's structured output.
pub fn normalize_response(response: &Value) -> Result<Map<String, Value>, String> {
    Payload::from_response(response).into_object()
}

/// Remove a surrounding ```` ``` ```` / ```` ```json ```` fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Calls the AI backend for one stage at a time.
///
/// Never retries and never returns an error: backend failures, timeouts,
/// cancellation and malformed output all become a failed [`StageResult`].
pub struct StageInvoker<'a, A: AI + ?Sized> {
    ai: &'a A,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl<'a, A: AI + ?Sized> StageInvoker<'a, A> {
    pub fn new(ai: &'a A, timeout: Duration) -> Self {
        Self {
            ai,
            timeout,
            cancel: None,
        }
    }

    /// Abort pending calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `prompt` for `stage`.
    pub async fn invoke(&self, stage: Stage, prompt: &str) -> StageResult {
        let started = Instant::now();
        let call = tokio::time::timeout(self.timeout, self.ai.run_stage(stage, prompt));

        let response = match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!(stage = %stage, "Stage call cancelled");
                    return StageResult::failed(stage, Value::Null, "cancelled");
                }
                result = call => result,
            },
            None => call.await,
        };

        let response = match response {
            Err(_) => {
                warn!(stage = %stage, timeout = ?self.timeout, "Stage call timed out");
                return StageResult::failed(
                    stage,
                    Value::Null,
                    format!("timed out after {:?}", self.timeout),
                );
            }
            Ok(Err(e)) => {
                warn!(stage = %stage, error = %e, "Stage call failed");
                return StageResult::failed(stage, Value::Null, e.to_string());
            }
            Ok(Ok(value)) => value,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match normalize_response(&response) {
            Ok(structured) => {
                debug!(stage = %stage, elapsed_ms, keys = structured.len(), "Stage call succeeded");
                StageResult::succeeded(stage, response, structured)
            }
            Err(reason) => {
                warn!(stage = %stage, elapsed_ms, reason = %reason, "Stage returned unusable output");
                StageResult::failed(stage, response, reason)
            }
        }
    }
}
