
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable that overrides `server.port`
pub const SERVER_PORT_ENV: &str = "SERVERPORT";

const MIN_BODY_BYTES: usize = 1024;
const MAX_BODY_BYTES: usize = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9020,
            request_timeout_secs: 120,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub embedding_model: String,
    pub generation_model: String,
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            embedding_model: "llama3".to_string(),
            generation_model: "llama3".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Lancedb,
    Memory,
}

/// Distance metric used for nearest-neighbor retrieval
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    L2,
    Cosine,
    Dot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table: String,
    pub distance: DistanceMetric,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Lancedb,
            table: "Document".to_string(),
            distance: DistanceMetric::L2,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid body size limit: {0} bytes (must be between 1 KiB and 1 GiB)")]
    InvalidBodyLimit(usize),
    #[error("Invalid listen host: {0:?} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid table name: {0:?} (cannot be empty)")]
    InvalidTable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory, `~/.ragserver`
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".ragserver"))
            .or_else(|| dirs::data_dir().map(|data| data.join("ragserver")))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when the
    /// file does not exist. Environment overrides are applied afterwards.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Apply `SERVERPORT` if it is set to a valid port number
    #[inline]
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var(SERVER_PORT_ENV)
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
        {
            self.server.port = port;
        }
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Directory holding the LanceDB tables
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.ollama.validate()?;
        self.store.validate()?;
        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        validate_timeout(self.request_timeout_secs)?;

        if !(MIN_BODY_BYTES..=MAX_BODY_BYTES).contains(&self.max_body_bytes) {
            return Err(ConfigError::InvalidBodyLimit(self.max_body_bytes));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// `host:port` string suitable for binding a listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        validate_timeout(self.timeout_secs)
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_embedding_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.embedding_model = model;
        Ok(())
    }

    pub fn set_generation_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.generation_model = model;
        Ok(())
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::InvalidTable(self.table.clone()));
        }
        Ok(())
    }
}

fn validate_timeout(seconds: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&seconds) {
        return Err(ConfigError::InvalidTimeout(seconds));
    }
    Ok(())
}
