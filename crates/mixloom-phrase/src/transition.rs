//! DJ-style transition mixing between an outgoing and an incoming stream.
//!
//! `Idle → Starting (optional wait for downbeat) → Transitioning → Complete`,
//! then `reset()` back to `Idle`.

use mixloom_core::StereoFrame;
use mixloom_dsp::{equal_power_gains, Biquad};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionType {
    /// Equal-power fade
    #[default]
    Crossfade,
    /// Bass swap: highs blend first, bass swaps in the second half
    EqSwap,
    /// Linear volume sweep
    Filter,
    /// Hard switch at the midpoint
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Starting,
    Transitioning,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub kind: TransitionType,
    pub duration_bars: f64,
    /// Reference tempo in BPM
    pub tempo: f64,
    /// Low-pass cutoff separating "bass" from the residual in `EqSwap`
    pub crossover_hz: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            kind: TransitionType::Crossfade,
            duration_bars: 4.0,
            tempo: 120.0,
            crossover_hz: 200.0,
        }
    }
}

impl TransitionConfig {
    /// `bars * 4 beats * (60 / tempo) * sample_rate`, at least one sample.
    pub fn transition_samples(&self, sample_rate: f64) -> u64 {
        let tempo = if self.tempo > 0.0 { self.tempo } else { 120.0 };
        let samples = self.duration_bars.max(0.0) * 4.0 * (60.0 / tempo) * sample_rate;
        (samples.round() as u64).max(1)
    }
}

/// Gains applied to the bass and residual bands of each side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandGains {
    pub outgoing_low: f32,
    pub outgoing_high: f32,
    pub incoming_low: f32,
    pub incoming_high: f32,
}

impl BandGains {
    fn uniform(outgoing: f32, incoming: f32) -> Self {
        Self {
            outgoing_low: outgoing,
            outgoing_high: outgoing,
            incoming_low: incoming,
            incoming_high: incoming,
        }
    }

    /// Gains for `kind` at global progress `p ∈ [0, 1]`.
    pub fn at(kind: TransitionType, progress: f32) -> Self {
        let p = progress.clamp(0.0, 1.0);
        match kind {
            TransitionType::Crossfade => {
                let (out, inc) = equal_power_gains(p);
                Self::uniform(out, inc)
            }
            TransitionType::EqSwap => {
                if p < 0.5 {
                    let p1 = 2.0 * p;
                    Self {
                        outgoing_low: 1.0,
                        outgoing_high: 1.0 - 0.3 * p1,
                        incoming_low: 0.0,
                        incoming_high: p1,
                    }
                } else {
                    let p2 = 2.0 * (p - 0.5);
                    Self {
                        outgoing_low: 1.0 - p2,
                        outgoing_high: 0.7 - 0.7 * p2,
                        incoming_low: p2,
                        incoming_high: 1.0,
                    }
                }
            }
            TransitionType::Filter => Self::uniform(1.0 - p, p),
            TransitionType::Cut => {
                if p < 0.5 {
                    Self::uniform(1.0, 0.0)
                } else {
                    Self::uniform(0.0, 1.0)
                }
            }
        }
    }
}

pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Sample-accurate transition mixer.
///
/// `EqSwap` splits each side with a single low-pass biquad and treats
/// `signal - bass` as the high band.
pub struct TransitionEngine {
    sample_rate: f64,
    config: TransitionConfig,
    transition_samples: u64,
    current_sample: u64,
    state: TransitionState,
    outgoing_lp: [Biquad; 2],
    incoming_lp: [Biquad; 2],
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("config", &self.config)
            .field("transition_samples", &self.transition_samples)
            .field("current_sample", &self.current_sample)
            .field("state", &self.state)
            .finish()
    }
}

impl TransitionEngine {
    pub fn new(sample_rate: f64) -> Self {
        let mut engine = Self {
            sample_rate,
            config: TransitionConfig::default(),
            transition_samples: 1,
            current_sample: 0,
            state: TransitionState::Idle,
            outgoing_lp: [Biquad::default(); 2],
            incoming_lp: [Biquad::default(); 2],
            on_progress: None,
        };
        engine.configure(TransitionConfig::default());
        engine
    }

    /// Apply a config, recompute the sample count and reset to `Idle`.
    pub fn configure(&mut self, config: TransitionConfig) {
        self.config = config;
        self.transition_samples = config.transition_samples(self.sample_rate);
        for filter in self.outgoing_lp.iter_mut().chain(self.incoming_lp.iter_mut()) {
            filter.set_lowpass(config.crossover_hz, self.sample_rate);
        }
        self.reset();
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    pub fn set_progress_callback(&mut self, callback: impl FnMut(f32) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    pub fn clear_progress_callback(&mut self) {
        self.on_progress = None;
    }

    /// Begin a transition, optionally holding in `Starting` until [`on_downbeat`].
    ///
    /// [`on_downbeat`]: Self::on_downbeat
    pub fn start(&mut self, wait_for_downbeat: bool) {
        self.current_sample = 0;
        for filter in self.outgoing_lp.iter_mut().chain(self.incoming_lp.iter_mut()) {
            filter.reset();
        }
        self.state = if wait_for_downbeat {
            TransitionState::Starting
        } else {
            TransitionState::Transitioning
        };
    }

    /// Release a transition waiting in `Starting`.
    pub fn on_downbeat(&mut self) {
        if self.state == TransitionState::Starting {
            self.state = TransitionState::Transitioning;
        }
    }

    pub fn reset(&mut self) {
        self.current_sample = 0;
        self.state = TransitionState::Idle;
        for filter in self.outgoing_lp.iter_mut().chain(self.incoming_lp.iter_mut()) {
            filter.reset();
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn transition_samples(&self) -> u64 {
        self.transition_samples
    }

    pub fn current_sample(&self) -> u64 {
        self.current_sample
    }

    pub fn progress(&self) -> f32 {
        (self.current_sample as f64 / self.transition_samples as f64).min(1.0) as f32
    }

    pub fn is_complete(&self) -> bool {
        self.current_sample >= self.transition_samples
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TransitionState::Starting | TransitionState::Transitioning
        )
    }

    /// Band gains for the configured type at `progress`.
    pub fn gains_at(&self, progress: f32) -> BandGains {
        BandGains::at(self.config.kind, progress)
    }

    /// Mix one frame. Outside `Transitioning` the output is whichever side
    /// is currently audible (outgoing before, incoming after).
    #[inline]
    pub fn process_frame(&mut self, outgoing: StereoFrame, incoming: StereoFrame) -> StereoFrame {
        match self.state {
            TransitionState::Idle | TransitionState::Starting => return outgoing,
            TransitionState::Complete => return incoming,
            TransitionState::Transitioning => {}
        }

        let p = (self.current_sample as f64 / self.transition_samples as f64) as f32;
        let kind = self.config.kind;
        let out = match kind {
            TransitionType::EqSwap => self.eq_swap_frame(outgoing, incoming, p),
            kind => {
                let g = BandGains::at(kind, p);
                (
                    outgoing.0 * g.outgoing_low + incoming.0 * g.incoming_low,
                    outgoing.1 * g.outgoing_low + incoming.1 * g.incoming_low,
                )
            }
        };

        self.current_sample += 1;
        if self.current_sample >= self.transition_samples {
            self.state = TransitionState::Complete;
        }
        out
    }

    fn eq_swap_frame(&mut self, outgoing: StereoFrame, incoming: StereoFrame, p: f32) -> StereoFrame {
        let g = BandGains::at(TransitionType::EqSwap, p);
        let mut mix = |ch: usize, out: f32, inc: f32| {
            let out_low = self.outgoing_lp[ch].process(out);
            let in_low = self.incoming_lp[ch].process(inc);
            out_low * g.outgoing_low
                + (out - out_low) * g.outgoing_high
                + in_low * g.incoming_low
                + (inc - in_low) * g.incoming_high
        };
        let left = mix(0, outgoing.0, incoming.0);
        let right = mix(1, outgoing.1, incoming.1);
        (left, right)
    }

    /// Fire the progress callback with the current progress.
    pub fn notify_progress(&mut self) {
        let progress = self.progress();
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }

    /// Mix `output.len()` frames (bounded by the inputs) and report progress.
    pub fn process(
        &mut self,
        outgoing: &[StereoFrame],
        incoming: &[StereoFrame],
        output: &mut [StereoFrame],
    ) {
        let frames = output.len().min(outgoing.len()).min(incoming.len());
        for i in 0..frames {
            output[i] = self.process_frame(outgoing[i], incoming[i]);
        }
        self.notify_progress();
    }
}
