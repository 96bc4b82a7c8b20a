//! Backend-neutral performance controls.

use mixloom_granular::GranularParameters;
use mixloom_phrase::PlayerParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One set of controls, translated into each backend's native parameters.
///
/// Everything except `tempo` (BPM) and `style_blend` is normalized to `0..=1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisParameters {
    pub density: f64,
    pub texture: f64,
    /// 0.5 is unity; 0 and 1 are an octave down and up
    pub pitch: f64,
    pub energy: f64,
    pub tempo: f64,
    pub variation: f64,
    pub style_blend: BTreeMap<String, f32>,
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        Self {
            density: 0.5,
            texture: 0.5,
            pitch: 0.5,
            energy: 0.5,
            tempo: 120.0,
            variation: 0.5,
            style_blend: BTreeMap::new(),
        }
    }
}

impl SynthesisParameters {
    fn unit(value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.5
        }
    }

    /// Pitch as a playback-rate ratio, `0.5..=2.0`.
    pub fn pitch_ratio(&self) -> f64 {
        2f64.powf((Self::unit(self.pitch) - 0.5) * 2.0)
    }

    /// Overlay onto `base`, keeping its window, scan and limit settings.
    pub fn to_granular(&self, base: &GranularParameters) -> GranularParameters {
        let density = Self::unit(self.density);
        let texture = Self::unit(self.texture);
        let variation = Self::unit(self.variation);
        GranularParameters {
            grain_density: 5.0 + density * 45.0,
            grain_size: 0.02 + texture * 0.18,
            position_jitter: variation * 0.5,
            pitch_jitter: variation * 0.1,
            amplitude: (0.3 + Self::unit(self.energy) * 0.7) as f32,
            pitch: self.pitch_ratio(),
            tempo: (self.tempo > 0.0).then_some(self.tempo),
            ..base.clone()
        }
    }

    pub fn to_player(&self, base: &PlayerParameters) -> PlayerParameters {
        let mut params = base.clone();
        params.scoring.energy_target = Some(Self::unit(self.energy));
        params
    }

    #[cfg(feature = "neural")]
    pub fn to_neural(&self, reference_tempo: f64) -> mixloom_neural::NeuralControls {
        let tempo_factor = if reference_tempo > 0.0 && self.tempo > 0.0 {
            self.tempo / reference_tempo
        } else {
            1.0
        };
        mixloom_neural::NeuralControls {
            style_blend: self.style_blend.clone(),
            energy: Self::unit(self.energy) as f32,
            tempo_factor: tempo_factor as f32,
            variation: Self::unit(self.variation) as f32,
        }
        .sanitized()
    }
}
