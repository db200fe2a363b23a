#[cfg(test)]
mod tests;

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, ConfigError, DistanceMetric, OllamaConfig, StoreBackend};
use crate::models::ollama::OllamaClient;

#[inline]
pub async fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 ragserver Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Server Configuration").bold().yellow());
    configure_server(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and generation.");
    eprintln!();
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Vector Store Configuration").bold().yellow());
    configure_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config).await {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before serving requests.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server Settings:").bold().yellow());
    eprintln!(
        "  Listen Address: {}",
        style(config.server.listen_address()).cyan()
    );
    eprintln!(
        "  Request Timeout: {}s",
        style(config.server.request_timeout_secs).cyan()
    );
    eprintln!(
        "  Max Body Size: {} bytes",
        style(config.server.max_body_bytes).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!(
        "  Generation Model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!("  Timeout: {}s", style(config.ollama.timeout_secs).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store Settings:").bold().yellow());
    eprintln!("  Backend: {}", style(format!("{:?}", config.store.backend)).cyan());
    eprintln!("  Table: {}", style(&config.store.table).cyan());
    eprintln!(
        "  Distance: {}",
        style(format!("{:?}", config.store.distance)).cyan()
    );
    if config.store.backend == StoreBackend::Lancedb {
        eprintln!(
            "  Path: {}",
            style(config.vector_database_path().display()).cyan()
        );
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_server(config: &mut Config) -> Result<()> {
    let host: String = Input::new()
        .with_prompt("Listen host")
        .default(config.server.host.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Host cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Listen port")
        .default(config.server.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(config.server.request_timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=3600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 3600 seconds")
            }
        })
        .interact_text()?;

    config.server.host = host;
    config.server.port = port;
    config.server.request_timeout_secs = timeout;

    Ok(())
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model = prompt_model("Embedding model", &ollama.embedding_model)?;
    let generation_model = prompt_model("Generation model", &ollama.generation_model)?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_generation_model(generation_model)?;

    Ok(())
}

fn prompt_model(prompt: &str, current: &str) -> Result<String> {
    let model = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(model)
}

fn configure_store(config: &mut Config) -> Result<()> {
    let backends = &["lancedb", "memory"];
    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(usize::from(config.store.backend == StoreBackend::Memory))
        .items(backends)
        .interact()?;

    let metrics = &["l2", "cosine", "dot"];
    let metric_default = match config.store.distance {
        DistanceMetric::L2 => 0,
        DistanceMetric::Cosine => 1,
        DistanceMetric::Dot => 2,
    };
    let metric_index = Select::new()
        .with_prompt("Distance metric")
        .default(metric_default)
        .items(metrics)
        .interact()?;

    config.store.backend = if backend_index == 0 {
        StoreBackend::Lancedb
    } else {
        StoreBackend::Memory
    };
    config.store.distance = match metric_index {
        0 => DistanceMetric::L2,
        1 => DistanceMetric::Cosine,
        _ => DistanceMetric::Dot,
    };

    Ok(())
}

async fn test_ollama_connection(config: &Config) -> bool {
    match OllamaClient::new(&config.ollama) {
        Ok(client) => client.ping().await.is_ok(),
        Err(_) => false,
    }
}
