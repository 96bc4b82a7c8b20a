//! Decoded audio shared read-only between grains, phrases and players.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a loaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

impl From<u32> for SourceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Decoded planar audio with optional onset/tempo analysis.
///
/// Immutable once built. Wrap in `Arc` to share between the control side
/// and any number of grains or players.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    sample_rate: f64,
    planes: Vec<Vec<f32>>,
    onsets: Vec<usize>,
    tempo: Option<f64>,
}

impl SourceBuffer {
    /// Build from per-channel planes. All planes must have the same length.
    pub fn from_planes(planes: Vec<Vec<f32>>, sample_rate: f64) -> Result<Self> {
        if planes.is_empty() {
            return Err(Error::InvalidSource("zero channels".into()));
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(Error::InvalidSource(format!(
                "sample rate {sample_rate} must be positive"
            )));
        }
        let frames = planes[0].len();
        if planes.iter().any(|p| p.len() != frames) {
            return Err(Error::InvalidSource("ragged channel planes".into()));
        }

        Ok(Self {
            sample_rate,
            planes,
            onsets: Vec::new(),
            tempo: None,
        })
    }

    /// Build from interleaved samples (`L R L R ...` for stereo).
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: f64) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidSource("zero channels".into()));
        }
        if samples.len() % channels != 0 {
            return Err(Error::InvalidSource(format!(
                "{} samples do not divide into {channels} channels",
                samples.len()
            )));
        }

        let frames = samples.len() / channels;
        let mut planes = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (plane, &s) in planes.iter_mut().zip(frame) {
                plane.push(s);
            }
        }
        Self::from_planes(planes, sample_rate)
    }

    /// Mono convenience constructor.
    pub fn mono(samples: Vec<f32>, sample_rate: f64) -> Result<Self> {
        Self::from_planes(vec![samples], sample_rate)
    }

    /// Attach onset positions (in samples) and a tempo estimate.
    ///
    /// Onsets past the end of the buffer are dropped and the rest sorted.
    pub fn with_onsets(mut self, mut onsets: Vec<usize>, tempo: Option<f64>) -> Self {
        let len = self.len();
        onsets.retain(|&o| o < len);
        onsets.sort_unstable();
        onsets.dedup();
        self.onsets = onsets;
        self.tempo = tempo.filter(|t| t.is_finite() && *t > 0.0);
        self
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.planes.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    pub fn plane(&self, channel: usize) -> Option<&[f32]> {
        self.planes.get(channel).map(Vec::as_slice)
    }

    pub fn onsets(&self) -> &[usize] {
        &self.onsets
    }

    pub fn tempo(&self) -> Option<f64> {
        self.tempo
    }

    pub fn has_analysis(&self) -> bool {
        !self.onsets.is_empty() || self.tempo.is_some()
    }

    /// Channel-averaged sample, index clamped into `[0, len)`.
    ///
    /// Returns 0.0 for an empty buffer.
    #[inline]
    pub fn mono_at(&self, index: usize) -> f32 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }
        let i = index.min(len - 1);
        let sum: f32 = self.planes.iter().map(|p| p[i]).sum();
        sum / self.planes.len() as f32
    }

    /// Stereo frame at a clamped index. Mono sources are duplicated,
    /// wider sources use their first two channels.
    #[inline]
    pub fn frame_at(&self, index: usize) -> (f32, f32) {
        let len = self.len();
        if len == 0 {
            return (0.0, 0.0);
        }
        let i = index.min(len - 1);
        match self.planes.len() {
            1 => (self.planes[0][i], self.planes[0][i]),
            _ => (self.planes[0][i], self.planes[1][i]),
        }
    }

    /// Linearly interpolated mono read at a fractional position, clamped.
    #[inline]
    pub fn mono_interpolated(&self, position: f64) -> f32 {
        let len = self.len();
        if len == 0 {
            return 0.0;
        }
        let max = (len - 1) as f64;
        let pos = position.clamp(0.0, max);
        let i0 = pos.floor() as usize;
        let i1 = (i0 + 1).min(len - 1);
        let frac = (pos - i0 as f64) as f32;
        let a = self.mono_at(i0);
        let b = self.mono_at(i1);
        a + (b - a) * frac
    }

    /// Channel-averaged copy of the whole buffer.
    pub fn to_mono(&self) -> Vec<f32> {
        (0..self.len()).map(|i| self.mono_at(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interleaved_deinterleaves() {
        let buf = SourceBuffer::from_interleaved(&[1.0, -1.0, 0.5, -0.5], 2, 44100.0).unwrap();
        assert_eq!(buf.channels(), 2);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.plane(0).unwrap(), &[1.0, 0.5]);
        assert_eq!(buf.plane(1).unwrap(), &[-1.0, -0.5]);
        assert_eq!(buf.frame_at(1), (0.5, -0.5));
    }

    #[test]
    fn test_rejects_bad_layouts() {
        assert!(SourceBuffer::from_interleaved(&[0.0; 3], 2, 44100.0).is_err());
        assert!(SourceBuffer::from_interleaved(&[0.0; 4], 0, 44100.0).is_err());
        assert!(SourceBuffer::from_planes(vec![vec![0.0; 4], vec![0.0; 3]], 44100.0).is_err());
        assert!(SourceBuffer::mono(vec![0.0; 4], 0.0).is_err());
        assert!(SourceBuffer::from_planes(Vec::new(), 44100.0).is_err());
    }

    #[test]
    fn test_reads_are_clamped() {
        let buf = SourceBuffer::mono(vec![0.1, 0.2, 0.3], 44100.0).unwrap();
        assert_eq!(buf.mono_at(100), 0.3);
        assert_relative_eq!(buf.mono_interpolated(0.5), 0.15, epsilon = 1e-6);
        assert_eq!(buf.mono_interpolated(-4.0), 0.1);
        assert_eq!(buf.mono_interpolated(99.0), 0.3);

        let empty = SourceBuffer::mono(Vec::new(), 44100.0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.mono_at(0), 0.0);
        assert_eq!(empty.frame_at(3), (0.0, 0.0));
    }

    #[test]
    fn test_with_onsets_filters_and_sorts() {
        let buf = SourceBuffer::mono(vec![0.0; 100], 1000.0)
            .unwrap()
            .with_onsets(vec![50, 10, 500, 10], Some(120.0));
        assert_eq!(buf.onsets(), &[10, 50]);
        assert_eq!(buf.tempo(), Some(120.0));
        assert!(buf.has_analysis());

        let buf = SourceBuffer::mono(vec![0.0; 10], 1000.0)
            .unwrap()
            .with_onsets(Vec::new(), Some(f64::NAN));
        assert_eq!(buf.tempo(), None);
    }
}
