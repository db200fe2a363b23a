// Vector store module
// Persists documents with their embeddings and answers nearest-neighbor queries

#[cfg(test)]
mod tests;

pub mod lancedb;
pub mod memory;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, StoreBackend};
use crate::models::EmbeddingVector;

pub use self::lancedb::LanceVectorStore;
pub use self::memory::InMemoryVectorStore;

/// Class name every ingested document is stored under
pub const DOCUMENT_CLASS: &str = "Document";

/// Field holding a stored object's text
pub const TEXT_FIELD: &str = "text";

/// The persisted unit: a document's text together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub class: String,
    pub text: String,
    pub vector: EmbeddingVector,
}

impl StoredObject {
    #[inline]
    pub fn document(text: impl Into<String>, vector: EmbeddingVector) -> Self {
        Self {
            class: DOCUMENT_CLASS.to_string(),
            text: text.into(),
            vector,
        }
    }
}

/// A stored object projected onto the fields requested by a query.
///
/// Values are untyped so that a store returning unexpected shapes is caught
/// by the caller's decoding step instead of here.
pub type PartialObject = Map<String, Value>;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Write every object as one batch; either all are stored or the call fails
    async fn batch_insert(
        &self,
        objects: Vec<StoredObject>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Return at most `k` objects ordered by ascending distance to `vector`,
    /// projected onto `fields`
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        fields: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<PartialObject>>;

    /// Number of objects currently stored
    async fn count(&self) -> Result<u64>;
}

/// Open the store selected by the configuration
#[inline]
pub async fn open_vector_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Lancedb => Arc::new(
            LanceVectorStore::new(config)
                .await
                .context("Failed to initialize LanceDB vector store")?,
        ),
        StoreBackend::Memory => Arc::new(InMemoryVectorStore::new(config.store.distance)),
    };
    Ok(store)
}
