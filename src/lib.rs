//! # mixloom - Real-time music generation engine
//!
//! Continuous audio from pre-analyzed material under live style, tempo and
//! energy controls.
//!
//! ## Architecture
//!
//! mixloom is an umbrella crate that coordinates:
//! - **mixloom-core** - Shared source buffers and errors
//! - **mixloom-dsp** - Biquad, one-pole, window tables, pan/gain laws
//! - **mixloom-analysis** - Onset detection and tempo estimation
//! - **mixloom-granular** - Granular synthesizer
//! - **mixloom-phrase** - Phrase-graph player, candidate scoring, DJ-style transitions
//! - **mixloom-neural** - Bridge to an external neural synthesis process
//!
//! ## Quick Start
//!
//! ```ignore
//! use mixloom::prelude::*;
//!
//! let engine = SynthesisEngine::builder().sample_rate(44100.0).build()?;
//!
//! engine.load_graph_file("collection/phrase_graph.json")?;
//! engine.load_song("songs/a.wav", decoded_a)?;
//! engine.set_backend(BackendKind::Concatenative)?;
//!
//! // Audio callback
//! engine.render(&mut left, &mut right);
//! ```
//!
//! ## Feature Flags
//!
//! - `neural` (default) - Neural backend over a Unix socket

pub use mixloom_analysis as analysis;
pub use mixloom_core as core;
pub use mixloom_dsp as dsp;
pub use mixloom_granular as granular;
pub use mixloom_phrase as phrase;

#[cfg(feature = "neural")]
pub use mixloom_neural as neural;

pub use mixloom_core::{SourceBuffer, SourceId, StereoFrame};

pub use mixloom_granular::{GranularParameters, GranularSynthesizer};

pub use mixloom_phrase::{
    PhraseGraph, PhraseGraphPlayer, PhraseNode, PlayerParameters, TransitionConfig,
    TransitionEngine, TransitionType,
};

#[cfg(feature = "neural")]
pub use mixloom_neural::{BridgeConfig, BridgeStatus, NeuralBridge, NeuralControls};

mod backend;
mod builder;
mod config;
mod engine;
mod error;
mod params;

pub use backend::{
    BackendKind, ConcatenativeBackend, GranularBackend, HybridBackend, SynthBackend,
    MAX_BLOCK_FRAMES,
};
#[cfg(feature = "neural")]
pub use backend::NeuralBackend;
pub use builder::EngineBuilder;
pub use config::EngineConfig;
pub use engine::SynthesisEngine;
pub use error::{Error, Result};
pub use params::SynthesisParameters;

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{BackendKind, EngineBuilder, EngineConfig, SynthesisEngine};

    // Controls
    pub use crate::{GranularParameters, PlayerParameters, SynthesisParameters};

    // Material
    pub use crate::{PhraseGraph, SourceBuffer, SourceId};

    // Transitions
    pub use crate::{TransitionConfig, TransitionType};

    // Neural
    #[cfg(feature = "neural")]
    pub use crate::{BridgeConfig, NeuralBridge, NeuralControls};
}
