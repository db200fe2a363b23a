// LanceDB vector database module
// Handles vector storage and similarity search for ingested documents

#[cfg(test)]
mod tests;

use ::lancedb::query::{ExecutableQuery, QueryBase, Select};
use ::lancedb::{Connection, DistanceType, Table};
use anyhow::{Context, Result, anyhow};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::{PartialObject, StoredObject, VectorStore};
use crate::config::{Config, DistanceMetric};
use crate::models::run_cancellable;

/// Vector store backed by a local LanceDB database
pub struct LanceVectorStore {
    connection: Connection,
    table_name: String,
    distance: DistanceType,
    /// Opened lazily; the table is created by the first insert because the
    /// vector dimension is only known once an embedding exists
    table: RwLock<Option<Table>>,
}

impl LanceVectorStore {
    /// Connect to the database under the configured base directory and open
    /// the document table if it already exists
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).with_context(|| {
            format!(
                "Failed to create vector database directory: {}",
                db_path.display()
            )
        })?;

        let uri = db_path.to_string_lossy().into_owned();
        let connection = ::lancedb::connect(&uri)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            connection,
            table_name: config.store.table.clone(),
            distance: distance_type(config.store.distance),
            table: RwLock::new(None),
        };

        if let Some(table) = store.open_existing_table().await? {
            info!("Opened existing table {}", store.table_name);
            *store.table.write().await = Some(table);
        }

        Ok(store)
    }

    async fn open_existing_table(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        if !table_names.contains(&self.table_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table {}", self.table_name))?;
        Ok(Some(table))
    }

    /// Dimension of the stored vectors, if the table exists yet
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>> {
        let Some(table) = self.table.read().await.clone() else {
            return Ok(None);
        };

        let schema = table.schema().await.context("Failed to get table schema")?;
        let dimension = schema.fields().iter().find_map(|field| {
            match (field.name().as_str(), field.data_type()) {
                ("vector", DataType::FixedSizeList(_, size)) => usize::try_from(*size).ok(),
                _ => None,
            }
        });
        Ok(dimension)
    }

    async fn insert_batch(&self, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        let existing = self.table.read().await.clone();
        if let Some(table) = existing {
            table
                .add(reader)
                .execute()
                .await
                .context("Failed to insert objects")?;
            return Ok(());
        }

        let mut guard = self.table.write().await;
        let created_meanwhile = guard.clone();
        if let Some(table) = created_meanwhile {
            // Another writer created the table while we waited for the lock
            table
                .add(reader)
                .execute()
                .await
                .context("Failed to insert objects")?;
            return Ok(());
        }

        info!("Creating table {}", self.table_name);
        let table = self
            .connection
            .create_table(&self.table_name, reader)
            .execute()
            .await
            .with_context(|| format!("Failed to create table {}", self.table_name))?;
        *guard = Some(table);
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize, fields: &[&str]) -> Result<Vec<PartialObject>> {
        let Some(table) = self.table.read().await.clone() else {
            debug!("Table {} does not exist yet, no matches", self.table_name);
            return Ok(Vec::new());
        };

        let results = table
            .vector_search(vector)
            .context("Failed to create vector search")?
            .column("vector")
            .distance_type(self.distance)
            .select(Select::columns(fields))
            .limit(k)
            .execute()
            .await
            .context("Failed to execute search")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to read result stream")?;

        let mut matches = Vec::new();
        for batch in &batches {
            matches.extend(parse_search_batch(batch, fields));
        }

        debug!("Parsed {} search results", matches.len());
        Ok(matches)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn batch_insert(
        &self,
        objects: Vec<StoredObject>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if objects.is_empty() {
            debug!("No objects to store");
            return Ok(());
        }

        let count = objects.len();
        let batch = create_record_batch(&objects)?;
        run_cancellable(cancel, self.insert_batch(batch)).await?;

        info!("Successfully stored {} objects", count);
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        fields: &[&str],
        cancel: &CancellationToken,
    ) -> Result<Vec<PartialObject>> {
        debug!("Searching for {} nearest neighbors", k);
        run_cancellable(cancel, self.search(vector, k, fields)).await
    }

    async fn count(&self) -> Result<u64> {
        let Some(table) = self.table.read().await.clone() else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .context("Failed to count rows")?;
        Ok(count as u64)
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::L2 => DistanceType::L2,
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::Dot => DistanceType::Dot,
    }
}

/// Schema for a table whose vectors have `vector_dim` components
fn create_schema(vector_dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("class", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                vector_dim,
            ),
            false,
        ),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// Build a single record batch holding every object
fn create_record_batch(objects: &[StoredObject]) -> Result<RecordBatch> {
    let len = objects.len();
    let vector_dim = objects.first().map_or(0, |o| o.vector.len());
    if let Some(bad) = objects.iter().find(|o| o.vector.len() != vector_dim) {
        return Err(anyhow!(
            "Inconsistent vector dimensions in batch: {} vs {}",
            vector_dim,
            bad.vector.len()
        ));
    }
    let vector_dim_i32 =
        i32::try_from(vector_dim).context("Vector dimension does not fit the schema")?;

    let created_at = Utc::now().to_rfc3339();
    let ids: Vec<String> = (0..len).map(|_| Uuid::new_v4().to_string()).collect();
    let classes: Vec<&str> = objects.iter().map(|o| o.class.as_str()).collect();
    let texts: Vec<&str> = objects.iter().map(|o| o.text.as_str()).collect();
    let created_ats = vec![created_at.as_str(); len];

    let mut flat_values = Vec::with_capacity(len * vector_dim);
    for object in objects {
        flat_values.extend_from_slice(&object.vector);
    }
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        vector_dim_i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .context("Failed to create vector array")?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(classes)),
        Arc::new(StringArray::from(texts)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim_i32), arrays)
        .context("Failed to create record batch")
}

/// Convert each row of a result batch into a partial object holding the
/// requested fields that are present in the batch
fn parse_search_batch(batch: &RecordBatch, fields: &[&str]) -> Vec<PartialObject> {
    (0..batch.num_rows())
        .map(|row| {
            let mut object = PartialObject::new();
            for &field in fields {
                if let Some(column) = batch.column_by_name(field) {
                    object.insert(field.to_string(), column_value(column.as_ref(), row));
                }
            }
            object
        })
        .collect()
}

fn column_value(column: &dyn Array, row: usize) -> Value {
    if column.is_null(row) {
        return Value::Null;
    }

    let any = column.as_any();
    if let Some(strings) = any.downcast_ref::<StringArray>() {
        return Value::from(strings.value(row));
    }
    if let Some(floats) = any.downcast_ref::<Float32Array>() {
        return Value::from(floats.value(row));
    }
    if let Some(lists) = any.downcast_ref::<FixedSizeListArray>() {
        let values = lists.value(row);
        return values
            .as_any()
            .downcast_ref::<Float32Array>()
            .map_or(Value::Null, |floats| {
                Value::from(floats.values().to_vec())
            });
    }

    Value::Null
}
