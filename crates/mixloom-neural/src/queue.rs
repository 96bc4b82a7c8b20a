//! Rolling buffer of generated samples.

/// Append-only sample queue with a read cursor.
///
/// Consumed samples are dropped once the backing storage grows past
/// `trim_threshold`, so `read_cursor <= samples.len()` always holds.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    samples: Vec<f32>,
    read_cursor: usize,
    trim_threshold: usize,
}

impl SampleQueue {
    pub fn new(trim_threshold: usize) -> Self {
        Self {
            samples: Vec::with_capacity(trim_threshold),
            read_cursor: 0,
            trim_threshold: trim_threshold.max(1),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        if self.samples.len() + samples.len() > self.trim_threshold {
            self.trim();
        }
        self.samples.extend_from_slice(samples);
    }

    fn trim(&mut self) {
        if self.read_cursor > 0 {
            self.samples.drain(..self.read_cursor);
            self.read_cursor = 0;
        }
    }

    /// Samples written but not yet read.
    pub fn available(&self) -> usize {
        self.samples.len() - self.read_cursor
    }

    /// Copy into `out`, zero-padding when starved. Returns samples actually read.
    pub fn read_into(&mut self, out: &mut [f32]) -> usize {
        let n = self.available().min(out.len());
        out[..n].copy_from_slice(&self.samples[self.read_cursor..self.read_cursor + n]);
        out[n..].fill(0.0);
        self.read_cursor += n;
        n
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.read_cursor = 0;
    }

    /// Storage currently held, read or not.
    pub fn stored(&self) -> usize {
        self.samples.len()
    }
}
