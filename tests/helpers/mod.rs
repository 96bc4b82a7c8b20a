//! Test helpers and fixtures for mixloom integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `GAIN_EPSILON` (1e-3): Gain laws evaluated in `f32`
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use mixloom::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Sample rate used by the end-to-end scenarios
pub const TEST_SAMPLE_RATE: f64 = 44100.0;

/// Standard buffer size for deterministic testing
pub const TEST_BUFFER_SIZE: usize = 512;

/// Engine at the test sample rate with default config.
pub fn test_engine() -> SynthesisEngine {
    SynthesisEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .build()
        .expect("Failed to create test engine")
}

/// Sine wave at `frequency` for `num_samples`.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Short decaying clicks every `interval_secs`, starting at 0.1s.
pub fn generate_click_train(interval_secs: f64, sample_rate: f64, duration_secs: f64) -> Vec<f32> {
    let num_samples = (sample_rate * duration_secs) as usize;
    let mut samples = vec![0.0f32; num_samples];
    let mut t = 0.1;
    while t < duration_secs {
        let pos = (t * sample_rate) as usize;
        for i in 0..50.min(num_samples.saturating_sub(pos)) {
            samples[pos + i] += 0.8 * (-0.1 * i as f32).exp();
        }
        t += interval_secs;
    }
    samples
}

/// White noise in -1..1 from a fixed seed.
pub fn generate_noise(num_samples: usize, seed: u64) -> Vec<f32> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..num_samples).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Mono source buffer from samples.
pub fn mono_source(samples: Vec<f32>, sample_rate: f64) -> SourceBuffer {
    SourceBuffer::mono(samples, sample_rate).expect("Failed to create source")
}

/// Render `num_samples` in `TEST_BUFFER_SIZE` blocks.
pub fn render_blocks(
    num_samples: usize,
    mut render: impl FnMut(&mut [f32], &mut [f32]),
) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; num_samples];
    let mut right = vec![0.0; num_samples];
    for (l, r) in left
        .chunks_mut(TEST_BUFFER_SIZE)
        .zip(right.chunks_mut(TEST_BUFFER_SIZE))
    {
        render(l, r);
    }
    (left, right)
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

pub fn is_silent(samples: &[f32]) -> bool {
    peak(samples) < tolerances::SILENCE_THRESHOLD
}

/// Route library logs to the test harness; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
