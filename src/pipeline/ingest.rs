use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Document, classify, ensure_not_cancelled};
use crate::database::{StoredObject, VectorStore};
use crate::models::EmbeddingClient;
use crate::{RagError, Result};

/// Embeds documents and stores them as one batch
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingClient>,
    store: Arc<dyn VectorStore>,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingClient>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed `documents` with a single model call and write them to the store
    /// as one batch. Returns how many documents were stored.
    ///
    /// Nothing is written unless every document received a vector.
    #[inline]
    pub async fn ingest(&self, documents: &[Document], cancel: &CancellationToken) -> Result<usize> {
        if documents.is_empty() {
            debug!("No documents to ingest");
            return Ok(0);
        }
        ensure_not_cancelled(cancel)?;

        let batch: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();

        info!(
            "invoking embedding model with {} documents",
            documents.len()
        );
        let vectors = self
            .embedder
            .embed(&batch, cancel)
            .await
            .map_err(|e| classify(cancel, &e, RagError::Embedding))?;

        if vectors.len() != documents.len() {
            return Err(RagError::EmbeddingCountMismatch {
                expected: documents.len(),
                actual: vectors.len(),
            });
        }

        let objects: Vec<StoredObject> = batch
            .into_iter()
            .zip(vectors)
            .map(|(text, vector)| StoredObject::document(text, vector))
            .collect();
        let count = objects.len();

        ensure_not_cancelled(cancel)?;
        info!("storing {} objects in vector store", count);
        self.store
            .batch_insert(objects, cancel)
            .await
            .map_err(|e| classify(cancel, &e, RagError::StoreWrite))?;

        Ok(count)
    }
}
