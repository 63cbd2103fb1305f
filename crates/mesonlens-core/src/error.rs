//! Error types for MesonLens

use std::path::PathBuf;
use thiserror::Error;

/// MesonLens error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Executable does not exist: {0}")]
    ToolMissing(PathBuf),

    #[error("Command is not executable: {0}")]
    ToolNotExecutable(PathBuf),

    #[error("Process error: {0}")]
    Process(String),

    #[error("No tool registered with id {0}")]
    UnknownTool(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for MesonLens
pub type Result<T> = std::result::Result<T, Error>;
