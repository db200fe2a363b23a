
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{PartialObject, StoredObject, VectorStore};
use crate::config::DistanceMetric;

/// Brute-force vector store kept entirely in process memory.
///
/// Every query scans all stored objects; intended for development and tests.
pub struct InMemoryVectorStore {
    objects: RwLock<Vec<StoredObject>>,
    metric: DistanceMetric,
}

impl InMemoryVectorStore {
    #[inline]
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            metric,
        }
    }

    /// Snapshot of everything stored so far, in insertion order
    #[inline]
    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.read().await.clone()
    }
}

impl Default for InMemoryVectorStore {
    #[inline]
    fn default() -> Self {
        Self::new(DistanceMetric::L2)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn batch_insert(
        &self,
        objects: Vec<StoredObject>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("Storing batch of {} objects in memory", objects.len());
        self.objects.write().await.extend(objects);
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        fields: &[&str],
        _cancel: &CancellationToken,
    ) -> Result<Vec<PartialObject>> {
        let objects = self.objects.read().await;

        let mut ranked: Vec<(f32, &StoredObject)> = objects
            .iter()
            .map(|object| (distance(self.metric, vector, &object.vector), object))
            .collect();
        // Stable sort keeps insertion order among equal distances
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(_, object)| project(object, fields))
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.objects.read().await.len() as u64)
    }
}

fn project(object: &StoredObject, fields: &[&str]) -> PartialObject {
    let mut partial = PartialObject::new();
    for &field in fields {
        let value = match field {
            "class" => Value::from(object.class.as_str()),
            "text" => Value::from(object.text.as_str()),
            "vector" => Value::from(object.vector.clone()),
            _ => continue,
        };
        partial.insert(field.to_string(), value);
    }
    partial
}

/// Distance between two vectors under `metric`; smaller is closer
#[inline]
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::L2 => euclidean_distance_squared(a, b),
        DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
        DistanceMetric::Dot => 1.0 - dot(a, b),
    }
}

fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (ma, mb) = (magnitude(a), magnitude(b));
    if ma == 0.0 || mb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (ma * mb)
}
