use anyhow::{Context, Result};
use contract_extraction::{AICredentials, PipelineConfig, SecretString};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::new)
            .context("OPENAI_API_KEY must be set")?;

        let mut pipeline = PipelineConfig::default();
        if let Some(size) = parse_var(&lookup, "CONTRACT_MAX_CHUNK_SIZE")? {
            pipeline = pipeline.with_max_chunk_size(size);
        }
        if let Some(overlap) = parse_var(&lookup, "CONTRACT_CHUNK_OVERLAP")? {
            pipeline = pipeline.with_chunk_overlap(overlap);
        }
        if let Some(seconds) = parse_var(&lookup, "CONTRACT_STAGE_TIMEOUT_SECONDS")? {
            pipeline = pipeline.with_stage_timeout(Duration::from_secs(seconds));
        }
        if let Some(limit) = parse_var(&lookup, "CONTRACT_CONCURRENCY_LIMIT")? {
            pipeline = pipeline.with_concurrency_limit(limit);
        }

        Ok(Self {
            openai_api_key,
            openai_model: lookup("OPENAI_MODEL"),
            openai_base_url: lookup("OPENAI_BASE_URL"),
            pipeline,
        })
    }

    pub fn credentials(&self) -> AICredentials {
        let mut credentials = AICredentials::new(self.openai_api_key.expose());
        if let Some(model) = &self.openai_model {
            credentials = credentials.with_model(model);
        }
        if let Some(url) = &self.openai_base_url {
            credentials = credentials.with_base_url(url);
        }
        credentials
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{} must be a valid number", name))
        })
        .transpose()
}
