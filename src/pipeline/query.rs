use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{classify, decode_texts, ensure_not_cancelled, render_prompt};
use crate::database::{TEXT_FIELD, VectorStore};
use crate::models::{EmbeddingClient, GenerationClient};
use crate::{RagError, Result};

/// Number of stored documents supplied to the model as context
pub const CONTEXT_DOCUMENTS: usize = 3;

/// Answers questions using the closest stored documents as context
pub struct QueryPipeline {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationClient>,
}

impl QueryPipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationClient>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
        }
    }

    /// Embed `content` and return the texts of the closest stored documents,
    /// nearest first
    #[inline]
    pub async fn retrieve(&self, content: &str, cancel: &CancellationToken) -> Result<Vec<String>> {
        ensure_not_cancelled(cancel)?;

        let mut vectors = self
            .embedder
            .embed(&[content.to_string()], cancel)
            .await
            .map_err(|e| classify(cancel, &e, RagError::Embedding))?;

        if vectors.len() != 1 {
            return Err(RagError::EmbeddingCountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        let query_vector = vectors.swap_remove(0);

        ensure_not_cancelled(cancel)?;
        let matches = self
            .store
            .nearest_neighbors(&query_vector, CONTEXT_DOCUMENTS, &[TEXT_FIELD], cancel)
            .await
            .map_err(|e| classify(cancel, &e, RagError::StoreRead))?;

        let contents = decode_texts(matches)?;
        debug!(
            "query: {:?} might match these {} docs: {:?}",
            content,
            contents.len(),
            contents.join("\n")
        );
        Ok(contents)
    }

    /// Answer `content`, grounding the model in the retrieved documents
    #[inline]
    pub async fn query(&self, content: &str, cancel: &CancellationToken) -> Result<String> {
        let (answer, _) = self.query_with_context(content, cancel).await?;
        Ok(answer)
    }

    /// Like [`Self::query`], also returning the documents the answer was
    /// grounded in
    #[inline]
    pub async fn query_with_context(
        &self,
        content: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<String>)> {
        let contents = self.retrieve(content, cancel).await?;
        let prompt = render_prompt(content, &contents);

        ensure_not_cancelled(cancel)?;
        let answer = match self.generator.generate(&prompt, cancel).await {
            Ok(answer) => answer,
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(RagError::Cancelled);
                }
                error!("calling generative model: {:#}", e);
                return Err(RagError::Generation(format!("{:#}", e)));
            }
        };

        if answer.is_empty() {
            error!("generative model returned an empty response");
            return Err(RagError::EmptyGeneration);
        }

        Ok((answer, contents))
    }
}
