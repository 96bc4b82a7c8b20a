//! Error types for phrase-graph loading and playback control.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No phrase graph loaded")]
    NoGraph,

    #[error("Unknown phrase: {0}")]
    UnknownPhrase(String),

    #[error("No decoded audio for {0}")]
    MissingAudio(String),

    #[error(transparent)]
    Source(#[from] mixloom_core::Error),

    #[error("Invalid phrase graph: {0}")]
    InvalidGraph(String),

    #[error("Failed to parse phrase graph: {0}")]
    GraphParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
