//! Onset detection via RMS flux.
//!
//! The detection function is the half-wave-rectified first difference of
//! framewise RMS. Peaks above `median + k·MAD` are onsets, with a minimum
//! spacing between them.

/// Default analysis window in samples
pub const DEFAULT_WINDOW_SIZE: usize = 1024;

/// Default hop between frames in samples
pub const DEFAULT_HOP_SIZE: usize = 512;

/// Default minimum time between onsets in seconds
pub const DEFAULT_MIN_GAP_SECS: f64 = 0.05;

const DEFAULT_MAD_MULTIPLIER: f32 = 1.5;

/// A detected onset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Onset {
    /// Sample position
    pub position: usize,
    /// Time in seconds
    pub time: f64,
    /// Normalized strength (0.0 - 1.0)
    pub strength: f32,
}

#[derive(Debug, Clone)]
pub struct OnsetDetector {
    sample_rate: f64,
    window_size: usize,
    hop_size: usize,
    mad_multiplier: f32,
    min_gap_secs: f64,
}

impl OnsetDetector {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            window_size: DEFAULT_WINDOW_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            mad_multiplier: DEFAULT_MAD_MULTIPLIER,
            min_gap_secs: DEFAULT_MIN_GAP_SECS,
        }
    }

    /// Set window and hop sizes. Hop is clamped to `[1, window]`.
    pub fn set_frame(&mut self, window_size: usize, hop_size: usize) {
        self.window_size = window_size.max(1);
        self.hop_size = hop_size.clamp(1, self.window_size);
    }

    /// Threshold is `median + multiplier·MAD`.
    pub fn set_mad_multiplier(&mut self, multiplier: f32) {
        self.mad_multiplier = multiplier.max(0.0);
    }

    pub fn set_min_gap(&mut self, seconds: f64) {
        self.min_gap_secs = seconds.max(0.0);
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Detect onsets in mono samples, sorted by position.
    pub fn detect(&self, samples: &[f32]) -> Vec<Onset> {
        let rms = self.frame_rms(samples);
        if rms.is_empty() {
            return Vec::new();
        }

        let flux = onset_strength(&rms);
        let threshold = adaptive_threshold(&flux, self.mad_multiplier);
        let max_flux = flux.iter().copied().fold(0.0f32, f32::max);
        if max_flux <= 0.0 {
            return Vec::new();
        }

        let mut onsets = Vec::new();
        for i in 0..flux.len() {
            let val = flux[i];
            let prev = if i > 0 { flux[i - 1] } else { 0.0 };
            let next = flux.get(i + 1).copied().unwrap_or(0.0);
            if val > threshold && val >= prev && val > next {
                let position = self.refine_position(samples, i);
                onsets.push(Onset {
                    position,
                    time: position as f64 / self.sample_rate,
                    strength: (val / max_flux).min(1.0),
                });
            }
        }

        enforce_min_gap(&mut onsets, self.min_gap_secs);
        onsets
    }

    fn frame_rms(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }
        let num_frames = if samples.len() <= self.window_size {
            1
        } else {
            1 + (samples.len() - self.window_size) / self.hop_size
        };

        (0..num_frames)
            .map(|f| {
                let start = f * self.hop_size;
                let end = (start + self.window_size).min(samples.len());
                let frame = &samples[start..end];
                let energy: f32 = frame.iter().map(|s| s * s).sum();
                (energy / frame.len() as f32).sqrt()
            })
            .collect()
    }

    /// Loudest sample inside the frame that produced the peak.
    fn refine_position(&self, samples: &[f32], frame: usize) -> usize {
        let start = frame * self.hop_size;
        let end = (start + self.window_size).min(samples.len());
        samples[start..end]
            .iter()
            .enumerate()
            .fold((start, 0.0f32), |(best, peak), (i, s)| {
                if s.abs() > peak {
                    (start + i, s.abs())
                } else {
                    (best, peak)
                }
            })
            .0
    }
}

/// Half-wave-rectified first difference. The first frame is compared to silence.
fn onset_strength(rms: &[f32]) -> Vec<f32> {
    let mut prev = 0.0;
    rms.iter()
        .map(|&r| {
            let diff = (r - prev).max(0.0);
            prev = r;
            diff
        })
        .collect()
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) * 0.5
    } else {
        values[mid]
    }
}

fn adaptive_threshold(flux: &[f32], multiplier: f32) -> f32 {
    let mut sorted = flux.to_vec();
    let med = median(&mut sorted);
    let mut deviations: Vec<f32> = flux.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&mut deviations);
    med + multiplier * mad
}

/// Drop onsets closer than `min_gap_secs` to their predecessor, keeping the stronger.
fn enforce_min_gap(onsets: &mut Vec<Onset>, min_gap_secs: f64) {
    onsets.sort_by_key(|o| o.position);
    onsets.dedup_by_key(|o| o.position);

    let mut i = 1;
    while i < onsets.len() {
        if onsets[i].time - onsets[i - 1].time < min_gap_secs {
            if onsets[i].strength > onsets[i - 1].strength {
                onsets.remove(i - 1);
            } else {
                onsets.remove(i);
            }
        } else {
            i += 1;
        }
    }
}
