//! Embedding provider implementations.
//!
//! Three backends behind the core [`EmbeddingProvider`] trait:
//!
//! - **local** — the deterministic [`HashEmbedder`]; no network, works
//!   offline, suitable for development and tests.
//! - **openai** — any OpenAI-compatible `/v1/embeddings` endpoint, with
//!   a bounded request timeout and exponential-backoff retry. Rate
//!   limits (429), server errors, and transport failures retry; other
//!   client errors fail immediately.
//! - **disabled** — always errors; keyword search keeps working without
//!   embeddings.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;

use docdex_core::embedding::{EmbeddingProvider, HashEmbedder};
use docdex_core::error::{Error, Result};

use crate::config::EmbeddingConfig;

/// Environment variable holding the remote provider's API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Instantiate the provider named in the configuration.
pub fn create_provider(config: &EmbeddingConfig) -> AnyResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(HashEmbedder::new(config.dims))),
        "openai" => Ok(Arc::new(OpenAiProvider::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledProvider)),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

/// Provider used when embeddings are not configured.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::ProviderUnavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

/// Remote provider for OpenAI-compatible embedding APIs.
pub struct OpenAiProvider {
    model: String,
    dims: usize,
    endpoint: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: &EmbeddingConfig) -> AnyResult<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for the openai provider"))?;
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{API_KEY_ENV} environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(OpenAiProvider {
            model,
            dims: config.dims,
            endpoint: config.endpoint.clone(),
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let mut last_err: Option<Error> = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // 1s, 2s, 4s, ... capped at 32s
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::ProviderUnavailable(format!("malformed response: {e}"))
                        })?;
                        return parse_embedding_response(&json, self.dims);
                    }

                    let text_body = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(Error::ProviderUnavailable(format!(
                            "embedding API error {status}: {text_body}"
                        )));
                        continue;
                    }
                    return Err(Error::InvalidArgument(format!(
                        "embedding API rejected request ({status}): {text_body}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::ProviderUnavailable(format!("request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::ProviderUnavailable("embedding failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "cannot embed empty text".to_string(),
            ));
        }
        self.request(text).await
    }
}

/// Pull the first `data[].embedding` array out of a response document.
fn parse_embedding_response(json: &serde_json::Value, expected_dims: usize) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::ProviderUnavailable("invalid embedding response shape".to_string())
        })?;

    let vector: Vec<f32> = embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if expected_dims != 0 && vector.len() != expected_dims {
        return Err(Error::ProviderUnavailable(format!(
            "embedding has {} dims, expected {}",
            vector.len(),
            expected_dims
        )));
    }
    Ok(vector)
}
