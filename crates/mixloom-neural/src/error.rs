//! Error types for the neural bridge

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Neural script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("No interpreter found (tried {0})")]
    InterpreterNotFound(String),

    #[error("Neural server failed to start: {0}")]
    StartupFailed(String),

    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Bridge connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Neural server process crashed: {0}")]
    ProcessCrashed(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Invalid audio frame: {0}")]
    InvalidFrame(String),

    #[error("Neural server error: {0}")]
    Remote(String),

    #[error("Neural bridge is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
