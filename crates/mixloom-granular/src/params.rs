//! Granular parameter snapshot.

use crate::evolution::EvolutionMode;
use crate::grain::MAX_GRAINS;
use mixloom_dsp::WindowShape;
use serde::{Deserialize, Serialize};

/// Shortest grain in seconds.
pub const MIN_GRAIN_SIZE: f64 = 0.01;
/// Longest grain in seconds.
pub const MAX_GRAIN_SIZE: f64 = 0.2;

/// Fallback tempo when tempo-sync has neither a configured nor a detected tempo.
pub const DEFAULT_TEMPO: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GranularParameters {
    /// Grain length in seconds
    pub grain_size: f64,
    /// Grains per second (ignored when `tempo_sync` is on)
    pub grain_density: f64,
    /// Scan start position, 0..1 over the source
    pub position: f64,
    /// Uniform scatter around the scan position, in the same 0..1 units
    pub position_jitter: f64,
    /// Playback ratio, 1.0 = original pitch
    pub pitch: f64,
    /// Relative pitch scatter, grain pitch = `pitch * (1 ± pitch_jitter)`
    pub pitch_jitter: f64,
    /// Pan scatter width, 0 = center, 1 = full stereo
    pub pan_spread: f32,
    pub amplitude: f32,
    pub window: WindowShape,
    pub tempo_sync: bool,
    /// BPM for tempo-sync. `None` uses the source's detected tempo.
    pub tempo: Option<f64>,
    /// 0 = free position, 1 = snap to nearest onset
    pub rhythm_alignment: f64,
    /// Scan speed, 0 = static
    pub position_evolution: f64,
    pub evolution_mode: EvolutionMode,
    /// One-pole smoothing cutoff in Hz
    pub smoothing_cutoff: f64,
    /// Active grain cap, never above [`MAX_GRAINS`]
    pub max_grains: usize,
    /// Fixed RNG seed for reproducible renders
    pub seed: Option<u64>,
}

impl Default for GranularParameters {
    fn default() -> Self {
        Self {
            grain_size: 0.1,
            grain_density: 15.0,
            position: 0.0,
            position_jitter: 0.05,
            pitch: 1.0,
            pitch_jitter: 0.0,
            pan_spread: 0.5,
            amplitude: 0.7,
            window: WindowShape::Hann,
            tempo_sync: false,
            tempo: None,
            rhythm_alignment: 0.0,
            position_evolution: 0.0,
            evolution_mode: EvolutionMode::Forward,
            smoothing_cutoff: 8000.0,
            max_grains: MAX_GRAINS,
            seed: None,
        }
    }
}

impl GranularParameters {
    /// Clamp every field into its usable range. Non-finite values fall back to defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let finite_or = |v: f64, d: f64| if v.is_finite() { v } else { d };

        self.grain_size =
            finite_or(self.grain_size, defaults.grain_size).clamp(MIN_GRAIN_SIZE, MAX_GRAIN_SIZE);
        self.grain_density = finite_or(self.grain_density, defaults.grain_density).max(0.0);
        self.position = finite_or(self.position, 0.0).clamp(0.0, 1.0);
        self.position_jitter = finite_or(self.position_jitter, 0.0).clamp(0.0, 1.0);
        self.pitch = finite_or(self.pitch, 1.0).clamp(0.125, 8.0);
        self.pitch_jitter = finite_or(self.pitch_jitter, 0.0).clamp(0.0, 0.99);
        self.pan_spread = if self.pan_spread.is_finite() {
            self.pan_spread.clamp(0.0, 1.0)
        } else {
            defaults.pan_spread
        };
        self.amplitude = if self.amplitude.is_finite() {
            self.amplitude.max(0.0)
        } else {
            defaults.amplitude
        };
        self.tempo = self.tempo.filter(|t| t.is_finite() && *t > 0.0);
        self.rhythm_alignment = finite_or(self.rhythm_alignment, 0.0).clamp(0.0, 1.0);
        self.position_evolution = finite_or(self.position_evolution, 0.0).max(0.0);
        self.smoothing_cutoff =
            finite_or(self.smoothing_cutoff, defaults.smoothing_cutoff).max(20.0);
        self.max_grains = self.max_grains.clamp(1, MAX_GRAINS);
        self
    }

    /// Grains per second actually scheduled.
    ///
    /// Tempo-sync runs at sixteenth notes, never slower than 8/s.
    pub fn effective_density(&self, source_tempo: Option<f64>) -> f64 {
        if self.tempo_sync {
            let tempo = self.tempo.or(source_tempo).unwrap_or(DEFAULT_TEMPO);
            (tempo / 60.0 * 4.0).max(8.0)
        } else {
            self.grain_density
        }
    }
}
