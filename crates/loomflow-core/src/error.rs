//! Loomflow error type.

use thiserror::Error;

/// All errors surfaced by Loomflow crates.
#[derive(Debug, Error)]
pub enum LoomflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LoomflowError>;
