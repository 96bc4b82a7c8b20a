//! Engine configuration, loadable from a TOML file.
//!
//! ```toml
//! sample_rate = 48000.0
//! hybrid_mix = 0.3
//!
//! [granular]
//! grain_size = 0.08
//! window = "blackman"
//!
//! [transition]
//! kind = "eqSwap"
//! duration_bars = 8.0
//!
//! [neural]
//! script = "scripts/rave_server.py"
//! model = "models/house.ts"
//! ```

use crate::error::{Error, Result};
use mixloom_granular::GranularParameters;
use mixloom_phrase::{PlayerParameters, TransitionConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    /// Phrase-graph share of the hybrid output (0 = all granular)
    pub hybrid_mix: f32,
    /// Tempo at which the neural model plays at its natural speed
    pub reference_tempo: f64,
    pub granular: GranularParameters,
    pub phrase: PlayerParameters,
    /// Replaces `phrase.transition`
    pub transition: TransitionConfig,
    #[cfg(feature = "neural")]
    pub neural: mixloom_neural::BridgeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            hybrid_mix: 0.5,
            reference_tempo: 120.0,
            granular: GranularParameters::default(),
            phrase: PlayerParameters::default(),
            transition: TransitionConfig::default(),
            #[cfg(feature = "neural")]
            neural: mixloom_neural::BridgeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Player parameters with the `[transition]` section applied.
    pub fn player_parameters(&self) -> PlayerParameters {
        PlayerParameters {
            transition: self.transition,
            ..self.phrase.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000.0..=384000.0).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.hybrid_mix) {
            return Err(Error::InvalidConfig(format!(
                "hybrid_mix {} out of range (0-1)",
                self.hybrid_mix
            )));
        }
        if !(self.reference_tempo.is_finite() && self.reference_tempo > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "reference_tempo {} must be positive",
                self.reference_tempo
            )));
        }
        if !(self.granular.grain_density.is_finite() && self.granular.grain_density > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "granular.grain_density {} must be positive",
                self.granular.grain_density
            )));
        }
        if !(self.transition.duration_bars > 0.0 && self.transition.tempo > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "transition needs positive duration_bars and tempo (got {} bars at {} BPM)",
                self.transition.duration_bars, self.transition.tempo
            )));
        }
        #[cfg(feature = "neural")]
        {
            let neural = &self.neural;
            if neural.frames_per_request == 0 {
                return Err(Error::InvalidConfig(
                    "neural.frames_per_request must be at least 1".to_string(),
                ));
            }
            if neural.max_buffered_samples < neural.low_water_samples {
                return Err(Error::InvalidConfig(format!(
                    "neural.max_buffered_samples {} is below low_water_samples {}",
                    neural.max_buffered_samples, neural.low_water_samples
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixloom_phrase::TransitionType;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            sample_rate = 48000.0

            [granular]
            grain_size = 0.05

            [transition]
            kind = "eqSwap"
            duration_bars = 8.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.granular.grain_size, 0.05);
        assert_eq!(config.granular.grain_density, 15.0);
        assert_eq!(config.player_parameters().transition.kind, TransitionType::EqSwap);
        assert_eq!(config.player_parameters().transition.duration_bars, 8.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("sample_rate = 100.0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("hybrid_mix = 2.0"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("sample_rate = \"fast\""),
            Err(Error::ConfigParse(_))
        ));
    }
}
