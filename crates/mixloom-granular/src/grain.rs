//! Grain value type and its fixed-capacity arena.

use mixloom_core::SourceId;
use mixloom_dsp::WindowShape;

/// Hard cap on simultaneously active grains.
pub const MAX_GRAINS: usize = 64;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Grain {
    pub source: SourceId,
    /// Index into the current source snapshot, revalidated every block
    pub slot: usize,
    /// First source sample read
    pub start: f64,
    /// Length in output samples
    pub length: usize,
    /// Source samples advanced per output sample
    pub rate: f64,
    pub gains: (f32, f32),
    pub amplitude: f32,
    pub window: WindowShape,
    pub cursor: usize,
}

impl Grain {
    /// Fractional source position of the current cursor.
    #[inline]
    pub fn source_position(&self) -> f64 {
        self.start + self.cursor as f64 * self.rate
    }
}

/// Read-only view of an active grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainInfo {
    pub source: SourceId,
    pub start: f64,
    pub cursor: usize,
    pub length: usize,
    pub source_position: f64,
}

/// Preallocated grain slots. Push never allocates; removal is swap-remove.
#[derive(Debug)]
pub(crate) struct GrainArena {
    grains: Vec<Grain>,
}

impl GrainArena {
    pub fn new() -> Self {
        Self {
            grains: Vec::with_capacity(MAX_GRAINS),
        }
    }

    pub fn len(&self) -> usize {
        self.grains.len()
    }

    /// Insert unless `limit` (itself capped at [`MAX_GRAINS`]) is reached.
    pub fn try_push(&mut self, grain: Grain, limit: usize) -> bool {
        if self.grains.len() >= limit.min(MAX_GRAINS) {
            return false;
        }
        self.grains.push(grain);
        true
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut Grain {
        &mut self.grains[index]
    }

    #[inline]
    pub fn swap_remove(&mut self, index: usize) {
        self.grains.swap_remove(index);
    }

    /// Keep grains for which `keep` returns true, in place.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut Grain) -> bool) {
        let mut i = 0;
        while i < self.grains.len() {
            if keep(&mut self.grains[i]) {
                i += 1;
            } else {
                self.grains.swap_remove(i);
            }
        }
    }

    pub fn clear(&mut self) {
        self.grains.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grain> {
        self.grains.iter()
    }
}
