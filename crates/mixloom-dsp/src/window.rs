//! Grain envelopes, precomputed once at full length and resampled by index.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Length every window table is computed at.
pub const MAX_WINDOW_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowShape {
    #[default]
    Hann,
    Hamming,
    Blackman,
    Triangle,
}

impl WindowShape {
    pub fn all() -> &'static [WindowShape] {
        &[
            WindowShape::Hann,
            WindowShape::Hamming,
            WindowShape::Blackman,
            WindowShape::Triangle,
        ]
    }

    /// Window value at normalized position `x ∈ [0, 1]`.
    #[inline]
    pub fn evaluate(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            WindowShape::Hann => 0.5 * (1.0 - (2.0 * PI * x).cos()),
            WindowShape::Hamming => 0.54 - 0.46 * (2.0 * PI * x).cos(),
            WindowShape::Blackman => {
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            }
            WindowShape::Triangle => 1.0 - (2.0 * x - 1.0).abs(),
        }
    }
}

/// All four envelopes at [`MAX_WINDOW_LEN`] points.
#[derive(Debug, Clone)]
pub struct WindowTable {
    tables: [Vec<f32>; 4],
}

impl Default for WindowTable {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowTable {
    pub fn new() -> Self {
        let build = |shape: WindowShape| -> Vec<f32> {
            let last = (MAX_WINDOW_LEN - 1) as f32;
            (0..MAX_WINDOW_LEN)
                .map(|i| shape.evaluate(i as f32 / last))
                .collect()
        };
        Self {
            tables: [
                build(WindowShape::Hann),
                build(WindowShape::Hamming),
                build(WindowShape::Blackman),
                build(WindowShape::Triangle),
            ],
        }
    }

    pub fn table(&self, shape: WindowShape) -> &[f32] {
        let idx = match shape {
            WindowShape::Hann => 0,
            WindowShape::Hamming => 1,
            WindowShape::Blackman => 2,
            WindowShape::Triangle => 3,
        };
        &self.tables[idx]
    }

    /// Envelope value at `cursor` of a grain `length` samples long,
    /// nearest-index resampled from the full table.
    #[inline]
    pub fn lookup(&self, shape: WindowShape, cursor: usize, length: usize) -> f32 {
        if length <= 1 {
            return 1.0;
        }
        let table = self.table(shape);
        let idx = cursor.min(length - 1) * (MAX_WINDOW_LEN - 1) / (length - 1);
        table[idx.min(MAX_WINDOW_LEN - 1)]
    }
}
