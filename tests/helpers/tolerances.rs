//! Tolerance constants for audio testing.

/// Floating point rounding errors (for passthrough, exact gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// Gain laws evaluated in `f32` (trig, interpolation).
pub const GAIN_EPSILON: f32 = 1e-3;

/// Silence threshold (~-80dB).
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Tempo estimates from synthetic click trains, in BPM.
pub const TEMPO_TOLERANCE_BPM: f64 = 2.0;
