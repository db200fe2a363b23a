use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, StoreBackend};
use crate::database::{LanceVectorStore, VectorStore, open_vector_store};
use crate::models::{EmbeddingClient, GenerationClient, OllamaClient};
use crate::pipeline::{Document, IngestionPipeline, QueryPipeline};
use crate::server::{self, AppState};

/// Both pipelines wired to the same collaborators
pub struct Pipelines {
    pub ingest: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
}

/// Construct the collaborators once and share them between the pipelines
#[inline]
pub async fn build_pipelines(config: &Config) -> Result<Pipelines> {
    let ollama = Arc::new(
        OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?,
    );
    let store = open_vector_store(config).await?;

    let embedder: Arc<dyn EmbeddingClient> = Arc::clone(&ollama) as Arc<dyn EmbeddingClient>;
    let generator: Arc<dyn GenerationClient> = ollama;

    Ok(Pipelines {
        ingest: Arc::new(IngestionPipeline::new(
            Arc::clone(&embedder),
            Arc::clone(&store),
        )),
        query: Arc::new(QueryPipeline::new(embedder, store, generator)),
    })
}

/// Start the HTTP server and block until shutdown
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    info!(
        "Starting RAG server on {} (store: {:?})",
        config.server.listen_address(),
        config.store.backend
    );

    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    match client.health_check().await {
        Ok(()) => info!("Ollama ready at {}", client.base_url()),
        Err(e) => {
            warn!("Ollama is not ready: {:#}", e);
            println!(
                "Warning: Ollama at {} is not ready. Requests will fail until it is.",
                client.base_url()
            );
            println!("Use 'ragserver config' to update connection settings.");
        }
    }

    if config.store.backend == StoreBackend::Memory {
        warn!("Using in-memory vector store; documents are lost on shutdown");
    }

    let pipelines = build_pipelines(config).await?;
    let state = AppState::new(
        pipelines.ingest,
        pipelines.query,
        config.server.request_timeout(),
    );

    server::serve(&config.server, state).await
}

/// Ingest documents given on the command line or read from a file, one per
/// non-blank line
#[inline]
pub async fn add_documents(config: &Config, texts: Vec<String>, file: Option<&Path>) -> Result<()> {
    let mut documents: Vec<Document> = texts.into_iter().map(Document::new).collect();

    if let Some(path) = file {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read documents from {}", path.display()))?;
        documents.extend(
            content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(Document::new),
        );
    }

    if documents.is_empty() {
        bail!("No documents given. Pass text arguments or --file <PATH>.");
    }

    if config.store.backend == StoreBackend::Memory {
        warn!("In-memory store selected; added documents will not outlive this command");
    }

    let pipelines = build_pipelines(config).await?;
    let cancel = cancel_on_interrupt();

    let count = pipelines.ingest.ingest(&documents, &cancel).await?;
    println!("Added {} documents", count);
    Ok(())
}

/// Answer a question from the command line
#[inline]
pub async fn run_query(config: &Config, content: &str, show_context: bool) -> Result<()> {
    let pipelines = build_pipelines(config).await?;
    let cancel = cancel_on_interrupt();

    let (answer, context) = pipelines.query.query_with_context(content, &cancel).await?;

    if show_context {
        println!("Context ({} documents):", context.len());
        for (index, text) in context.iter().enumerate() {
            println!("  {}. {}", index + 1, text);
        }
        println!();
    }

    println!("{}", answer);
    Ok(())
}

/// Report on the model server and the vector store
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Server Status Report");
    println!("{}", "=".repeat(50));
    println!();
    println!("📁 Config: {}", config.config_file_path().display());
    println!("🌐 Listen: {}", config.server.listen_address());
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check().await {
            Ok(()) => {
                println!("   ✅ Ollama: Connected ({})", client.base_url());
                println!("   📋 Embedding model: {}", config.ollama.embedding_model);
                println!("   📋 Generation model: {}", config.ollama.generation_model);
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to create client - {:#}", e);
        }
    }

    println!();
    println!("🔍 Vector Store Status:");
    match config.store.backend {
        StoreBackend::Lancedb => match LanceVectorStore::new(config).await {
            Ok(store) => {
                println!(
                    "   ✅ LanceDB: {}",
                    config.vector_database_path().display()
                );
                println!("   📋 Table: {}", config.store.table);
                println!("   📏 Distance: {:?}", config.store.distance);
                match store.count().await {
                    Ok(count) => println!("   📄 Documents: {}", count),
                    Err(e) => println!("   ⚠️  Documents: unknown - {:#}", e),
                }
                match store.vector_dimension().await {
                    Ok(Some(dimension)) => println!("   🔢 Vector dimension: {}", dimension),
                    Ok(None) => println!("   🔢 Vector dimension: no documents yet"),
                    Err(e) => println!("   ⚠️  Vector dimension: unknown - {:#}", e),
                }
            }
            Err(e) => {
                error!("Failed to open LanceDB: {:#}", e);
                println!("   ❌ LanceDB: Failed to open - {:#}", e);
            }
        },
        StoreBackend::Memory => {
            println!("   💭 In-memory store (contents live only while the server runs)");
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'ragserver add <TEXT>' to ingest documents");
    println!("   • Use 'ragserver query <QUESTION>' to ask a question");
    println!("   • Use 'ragserver serve' to start the HTTP server");

    Ok(())
}

/// Token that is cancelled when the user presses Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight request");
            watcher.cancel();
        }
    });
    cancel
}
