//! Error types for mindmirror-core

use thiserror::Error;

/// Main error type for the mindmirror-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error (SQLite model store)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model blob encoding error
    #[error("model encoding error: {0}")]
    Encode(#[from] bincode::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Generative service error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding service error
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Clustering / theme extraction error
    #[error("clustering error: {0}")]
    Clustering(String),

    /// Model persistence error
    #[error("model store error: {0}")]
    ModelStore(String),
}

/// Result type alias for mindmirror-core
pub type Result<T> = std::result::Result<T, Error>;
