//! One-pole low-pass used to smooth grain boundaries.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy)]
pub struct OnePole {
    alpha: f32,
    state: f32,
}

impl OnePole {
    pub fn new(cutoff_hz: f64, sample_rate: f64) -> Self {
        let mut filter = Self {
            alpha: 1.0,
            state: 0.0,
        };
        filter.set_cutoff(cutoff_hz, sample_rate);
        filter
    }

    /// `alpha = dt / (rc + dt)` with `rc = 1 / (2π·cutoff)`.
    pub fn set_cutoff(&mut self, cutoff_hz: f64, sample_rate: f64) {
        let dt = 1.0 / sample_rate;
        let rc = 1.0 / (2.0 * PI * cutoff_hz.max(1.0));
        self.alpha = (dt / (rc + dt)) as f32;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        self.state += self.alpha * (x - self.state);
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
