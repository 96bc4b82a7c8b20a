//! Centralized error type for the mixloom umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use crate::backend::BackendKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mixloom_core::Error),

    #[error("Phrase: {0}")]
    Phrase(#[from] mixloom_phrase::Error),

    #[cfg(feature = "neural")]
    #[error("Neural: {0}")]
    Neural(#[from] mixloom_neural::BridgeError),

    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
