
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{EmbeddingClient, EmbeddingVector, GenerationClient, run_cancellable};
use crate::config::OllamaConfig;

/// Client for the Ollama HTTP API, used for both embedding and generation
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    generation_model: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            generation_model: config.generation_model.clone(),
            http: build_http_client(config.timeout())?,
        })
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Check the server is reachable and both configured models are installed
    #[inline]
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().await.context("Server ping failed")?;

        for wanted in [&self.embedding_model, &self.generation_model] {
            if !models.iter().any(|m| model_matches(&m.name, wanted)) {
                let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
                warn!(
                    "Model {} not found. Available models: {:?}",
                    wanted, available
                );
                return Err(anyhow!(
                    "Model '{}' is not available. Available models: {:?}",
                    wanted,
                    available
                ));
            }
        }

        info!(
            "Health check passed for Ollama server at {} (embedding: {}, generation: {})",
            self.base_url, self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub async fn ping(&self) -> Result<()> {
        self.list_models()
            .await
            .context("Failed to ping Ollama server")?;
        debug!("Server ping successful");
        Ok(())
    }

    /// List all models installed on the server
    #[inline]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("api/tags")?;
        debug!("Fetching available models from {}", url);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .context("Failed to fetch models")?;
        let models: ModelsResponse = read_json(response)
            .await
            .context("Failed to parse models response")?;

        debug!("Found {} models", models.models.len());
        Ok(models.models)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build {} URL", path))
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", path))?;
        read_json(response).await
    }
}

#[async_trait]
impl EmbeddingClient for OllamaClient {
    async fn embed(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<EmbeddingVector>> {
        debug!(
            "Generating embeddings for {} texts with {}",
            texts.len(),
            self.embedding_model
        );

        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let response: EmbedResponse = run_cancellable(cancel, self.post_json("api/embed", &request))
            .await
            .context("ollama embedding request failed")?;

        debug!("Received {} embeddings", response.embeddings.len());
        Ok(response.embeddings)
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        debug!(
            "Generating response with {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let request = GenerateRequest {
            model: &self.generation_model,
            prompt,
            stream: false,
        };
        let response: GenerateResponse =
            run_cancellable(cancel, self.post_json("api/generate", &request))
                .await
                .context("ollama generate request failed")?;

        Ok(response.response)
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map_or(body, |e| e.error);
        return Err(anyhow!("HTTP {}: {}", status.as_u16(), message));
    }

    serde_json::from_str(&body).context("Failed to decode response body")
}

/// Ollama reports installed models with an explicit tag (`llama3:latest`)
fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted))
}
