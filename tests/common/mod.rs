// Recording fakes for the model and store collaborators

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ragserver::database::{PartialObject, StoredObject, VectorStore};
use ragserver::models::{EmbeddingClient, EmbeddingVector, GenerationClient, run_cancellable};
use ragserver::pipeline::{IngestionPipeline, QueryPipeline};

pub enum EmbedScript {
    /// One two-dimensional vector per input text
    PerText,
    /// Always return these vectors, whatever the input
    Fixed(Vec<EmbeddingVector>),
    Fail(&'static str),
    /// Never answers until cancelled
    Hang,
}

pub struct FakeEmbedder {
    script: EmbedScript,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeEmbedder {
    pub fn new(script: EmbedScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    async fn embed(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> Result<Vec<EmbeddingVector>> {
        self.calls.lock().expect("lock poisoned").push(texts.to_vec());

        match &self.script {
            EmbedScript::PerText => Ok(texts
                .iter()
                .map(|text| vec![text.len() as f32, 1.0])
                .collect()),
            EmbedScript::Fixed(vectors) => Ok(vectors.clone()),
            EmbedScript::Fail(message) => Err(anyhow!(*message)),
            EmbedScript::Hang => run_cancellable(cancel, std::future::pending()).await,
        }
    }
}

#[derive(Default)]
pub struct FakeStore {
    matches: Vec<PartialObject>,
    fail_insert: Option<&'static str>,
    fail_query: Option<&'static str>,
    inserts: Mutex<Vec<Vec<StoredObject>>>,
    queries: Mutex<Vec<(Vec<f32>, usize, Vec<String>)>>,
}

impl FakeStore {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_matches(matches: Vec<PartialObject>) -> Arc<Self> {
        Arc::new(Self {
            matches,
            ..Self::default()
        })
    }

    pub fn with_texts(texts: &[&str]) -> Arc<Self> {
        Self::with_matches(
            texts
                .iter()
                .map(|text| {
                    let mut object = PartialObject::new();
                    object.insert("text".to_string(), (*text).into());
                    object
                })
                .collect(),
        )
    }

    pub fn failing_insert(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_insert: Some(message),
            ..Self::default()
        })
    }

    pub fn failing_query(message: &'static str) -> Arc<Self> {
        Arc::new(Self {
            fail_query: Some(message),
            ..Self::default()
        })
    }

    pub fn inserts(&self) -> Vec<Vec<StoredObject>> {
        self.inserts.lock().expect("lock poisoned").clone()
    }

    pub fn queries(&self) -> Vec<(Vec<f32>, usize, Vec<String>)> {
        self.queries.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn batch_insert(
        &self,
        objects: Vec<StoredObject>,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        if let Some(message) = self.fail_insert {
            return Err(anyhow!(message));
        }
        self.inserts.lock().expect("lock poisoned").push(objects);
        Ok(())
    }

    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        k: usize,
        fields: &[&str],
        _cancel: &CancellationToken,
    ) -> Result<Vec<PartialObject>> {
        self.queries.lock().expect("lock poisoned").push((
            vector.to_vec(),
            k,
            fields.iter().map(|field| (*field).to_string()).collect(),
        ));
        if let Some(message) = self.fail_query {
            return Err(anyhow!(message));
        }
        Ok(self.matches.iter().take(k).cloned().collect())
    }

    async fn count(&self) -> Result<u64> {
        let inserted: usize = self
            .inserts
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(Vec::len)
            .sum();
        Ok(inserted as u64)
    }
}

pub enum GenerateScript {
    Answer(&'static str),
    Fail(&'static str),
    Hang,
}

pub struct FakeGenerator {
    script: GenerateScript,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(script: GenerateScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(answer: &'static str) -> Arc<Self> {
        Self::new(GenerateScript::Answer(answer))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl GenerationClient for FakeGenerator {
    async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<String> {
        self.prompts
            .lock()
            .expect("lock poisoned")
            .push(prompt.to_string());

        match &self.script {
            GenerateScript::Answer(answer) => Ok((*answer).to_string()),
            GenerateScript::Fail(message) => Err(anyhow!(*message)),
            GenerateScript::Hang => run_cancellable(cancel, std::future::pending()).await,
        }
    }
}

pub fn ingestion(embedder: &Arc<FakeEmbedder>, store: &Arc<FakeStore>) -> IngestionPipeline {
    IngestionPipeline::new(
        Arc::clone(embedder) as Arc<dyn EmbeddingClient>,
        Arc::clone(store) as Arc<dyn VectorStore>,
    )
}

pub fn querying(
    embedder: &Arc<FakeEmbedder>,
    store: &Arc<FakeStore>,
    generator: &Arc<FakeGenerator>,
) -> QueryPipeline {
    QueryPipeline::new(
        Arc::clone(embedder) as Arc<dyn EmbeddingClient>,
        Arc::clone(store) as Arc<dyn VectorStore>,
        Arc::clone(generator) as Arc<dyn GenerationClient>,
    )
}
