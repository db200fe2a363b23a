use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragserver::commands::{add_documents, run_query, serve, show_status};
use ragserver::config::{Config, resolve_config_dir, run_interactive_config, show_config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragserver")]
#[command(about = "Retrieval-augmented generation server backed by Ollama and a vector store")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector database
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Embed and store documents
    Add {
        /// Document texts, one document per argument
        texts: Vec<String>,
        /// Read additional documents from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask a question answered with the stored documents as context
    Query {
        /// The question
        content: String,
        /// Print the retrieved documents before the answer
        #[arg(long)]
        show_context: bool,
    },
    /// Show the state of the model server and vector store
    Status,
    /// Configure the server, Ollama connection and vector store
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_dir = resolve_config_dir(cli.config_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir).await?;
            }
        }
        Commands::Serve => {
            serve(&load_config(&config_dir)?).await?;
        }
        Commands::Add { texts, file } => {
            add_documents(&load_config(&config_dir)?, texts, file.as_deref()).await?;
        }
        Commands::Query {
            content,
            show_context,
        } => {
            run_query(&load_config(&config_dir)?, &content, show_context).await?;
        }
        Commands::Status => {
            show_status(&load_config(&config_dir)?).await?;
        }
    }

    Ok(())
}

fn load_config(config_dir: &std::path::Path) -> Result<Config> {
    Config::load(config_dir).context("Failed to load configuration")
}
