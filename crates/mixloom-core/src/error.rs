//! Error types for source loading and backend start-up.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("No source loaded")]
    NoSource,

    #[error("Source {0} contains no samples")]
    EmptySource(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
