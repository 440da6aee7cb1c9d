//! Error types for the backup orchestrator.

use std::path::PathBuf;
use thiserror::Error;

use crate::compress::CompressError;

#[derive(Error, Debug)]
pub enum LocbkpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Insufficient space at {}: need {required} bytes, {available} available", path.display())]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("No staging root has {required} bytes free")]
    NoStagingRoot { required: u64 },

    #[error("Compression error: {0}")]
    Compression(#[from] CompressError),

    #[error("Transfer error: {0}")]
    Transfer(String),
}

pub type Result<T> = std::result::Result<T, LocbkpError>;
