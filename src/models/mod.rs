// Model collaborators
// Embedding and generation capabilities, plus the Ollama implementation


pub mod ollama;

use std::future::Future;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use ollama::OllamaClient;

/// A fixed-dimension embedding vector
pub type EmbeddingVector = Vec<f32>;

/// Converts a batch of texts into embedding vectors.
///
/// The output is expected to correspond to the input by index, but callers
/// must check the length themselves.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<EmbeddingVector>>;
}

/// Produces a complete text response for a prompt
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String>;
}

/// Run `operation` until it finishes or `cancel` fires, whichever comes first.
/// A cancelled operation is dropped before completion.
#[inline]
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(anyhow!("request cancelled")),
        result = operation => result,
    }
}
