use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("embedded batch size mismatch: expected {expected} vectors, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("Vector store write error: {0}")]
    StoreWrite(String),

    #[error("Vector store read error: {0}")]
    StoreRead(String),

    #[error("reading vector store response: {0}")]
    Decoding(String),

    /// Detail is logged where the failure happens and never shown to callers.
    #[error("generative model error")]
    Generation(String),

    #[error("generative model error")]
    EmptyGeneration,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// HTTP status code reported to the caller for this failure
    #[inline]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MalformedRequest(_) => 400,
            Self::Cancelled => 503,
            Self::TimedOut(_) => 504,
            _ => 500,
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod models;
pub mod pipeline;
pub mod server;
