//! OpenAI implementation of the AI trait.
//!
//! Talks to any OpenAI-compatible chat completions endpoint in JSON mode.
//!
//! # Example
//!
//! ```rust,ignore
//! use contract_extraction::ai::OpenAI;
//!
//! let ai = OpenAI::new("sk-...").with_model("gpt-4o-mini");
//! let pipeline = Pipeline::new(ai);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ContractError, Result};
use crate::security::credentials::AICredentials;
use crate::traits::ai::AI;
use crate::types::stage::Stage;

/// OpenAI-based AI implementation.
#[derive(Clone)]
pub struct OpenAI {
    client: Client,
    credentials: AICredentials,
}

impl OpenAI {
    /// Create a new OpenAI client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_credentials(AICredentials::new(api_key))
    }

    pub fn from_credentials(credentials: AICredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
        }
    }

    /// Create from environment variable `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ContractError::Config("OPENAI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_model(model);
        self
    }

    /// Set a custom base URL (for proxies or compatible gateways).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.credentials = self.credentials.with_base_url(url);
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.credentials.model
    }

    fn request_for(&self, stage: Stage, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.credentials.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(stage),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.0,
            response_format: json!({ "type": "json_object" }),
        }
    }
}

/// Per-stage system message.
fn system_prompt(stage: Stage) -> String {
    format!(
        "You are the {} in a contract analysis pipeline. Respond with a single JSON object and nothing else.",
        stage.agent_name()
    )
}

#[async_trait]
impl AI for OpenAI {
    async fn run_stage(&self, stage: Stage, prompt: &str) -> Result<Value> {
        let request = self.request_for(stage, prompt);
        debug!(stage = %stage, model = %self.credentials.model, prompt_len = prompt.len(), "Sending chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.credentials.base_url))
            .bearer_auth(self.credentials.api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| ContractError::AI(e.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ContractError::AI(
                format!("OpenAI API error ({}): {}", status, error_text).into(),
            ));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ContractError::AI(e.into()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ContractError::AI("No response from OpenAI".into()))?;

        // The invoker unwraps `content` and parses the JSON text
        Ok(json!({ "content": content }))
    }
}

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
