//! Offline analysis run when a source is loaded.
//!
//! - **Onset detection** - framewise RMS flux with a median/MAD adaptive threshold
//! - **Tempo estimation** - median inter-onset interval, octave-corrected
//!
//! Functions take plain `&[f32]` mono samples and a sample rate so they can
//! run on any decoded buffer.

mod onset;
mod tempo;

pub use onset::{Onset, OnsetDetector, DEFAULT_HOP_SIZE, DEFAULT_MIN_GAP_SECS, DEFAULT_WINDOW_SIZE};
pub use tempo::{correct_tempo_octave, estimate_tempo, MAX_TEMPO_BPM, MIN_TEMPO_BPM};

/// Onsets plus the tempo derived from them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnsetAnalysis {
    pub onsets: Vec<Onset>,
    pub tempo: Option<f64>,
}

impl OnsetAnalysis {
    /// Onset positions in samples.
    pub fn positions(&self) -> Vec<usize> {
        self.onsets.iter().map(|o| o.position).collect()
    }
}

/// Detect onsets with default settings and estimate tempo from them.
pub fn analyze(samples: &[f32], sample_rate: f64) -> OnsetAnalysis {
    let onsets = OnsetDetector::new(sample_rate).detect(samples);
    let positions: Vec<usize> = onsets.iter().map(|o| o.position).collect();
    let tempo = estimate_tempo(&positions, sample_rate);
    tracing::debug!(
        onsets = onsets.len(),
        tempo = ?tempo,
        "Analyzed {} samples",
        samples.len()
    );
    OnsetAnalysis { onsets, tempo }
}
