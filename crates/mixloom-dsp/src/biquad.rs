//! Second-order IIR section in Direct Form II Transposed.

use std::f64::consts::PI;

/// Q for a maximally flat (Butterworth) second-order response.
pub const BUTTERWORTH_Q: f64 = 0.707;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    /// Identity filter.
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }
}

impl Biquad {
    /// Butterworth low-pass at `cutoff_hz`.
    pub fn lowpass(cutoff_hz: f64, sample_rate: f64) -> Self {
        let mut filter = Self::default();
        filter.set_lowpass(cutoff_hz, sample_rate);
        filter
    }

    /// Recompute low-pass coefficients, keeping filter state.
    ///
    /// Cutoff is clamped below Nyquist.
    pub fn set_lowpass(&mut self, cutoff_hz: f64, sample_rate: f64) {
        let nyquist = sample_rate * 0.5;
        let cutoff = cutoff_hz.clamp(1.0, nyquist * 0.99);
        let omega = 2.0 * PI * cutoff / sample_rate;
        let (sin_w, cos_w) = omega.sin_cos();
        let alpha = sin_w / (2.0 * BUTTERWORTH_Q);

        let a0 = 1.0 + alpha;
        let b1 = 1.0 - cos_w;
        let b0 = b1 / 2.0;

        self.b0 = (b0 / a0) as f32;
        self.b1 = (b1 / a0) as f32;
        self.b2 = (b0 / a0) as f32;
        self.a1 = (-2.0 * cos_w / a0) as f32;
        self.a2 = ((1.0 - alpha) / a0) as f32;
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}
