//! Builder for configuring and constructing a `SynthesisEngine`.

use crate::config::EngineConfig;
use crate::{Result, SynthesisEngine};
use mixloom_granular::GranularParameters;
use mixloom_phrase::{PlayerParameters, TransitionConfig};
use std::path::Path;

/// # Example
///
/// ```ignore
/// use mixloom::prelude::*;
///
/// let engine = SynthesisEngine::builder()
///     .sample_rate(48000.0)
///     .hybrid_mix(0.3)
///     .transition(TransitionConfig { kind: TransitionType::EqSwap, ..Default::default() })
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Start from a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            config: EngineConfig::load(path)?,
        })
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 0.5
    pub fn hybrid_mix(mut self, mix: f32) -> Self {
        self.config.hybrid_mix = mix;
        self
    }

    /// Default: 120 BPM
    pub fn reference_tempo(mut self, bpm: f64) -> Self {
        self.config.reference_tempo = bpm;
        self
    }

    pub fn granular(mut self, params: GranularParameters) -> Self {
        self.config.granular = params;
        self
    }

    pub fn phrase(mut self, params: PlayerParameters) -> Self {
        self.config.phrase = params;
        self
    }

    pub fn transition(mut self, config: TransitionConfig) -> Self {
        self.config.transition = config;
        self
    }

    #[cfg(feature = "neural")]
    pub fn neural(mut self, config: mixloom_neural::BridgeConfig) -> Self {
        self.config.neural = config;
        self
    }

    pub fn build(self) -> Result<SynthesisEngine> {
        SynthesisEngine::new(self.config)
    }
}
