//! Backend adapters behind the [`SynthesisEngine`](crate::SynthesisEngine).
//!
//! Every synthesis strategy is driven through [`SynthBackend`]; the engine
//! picks one by [`BackendKind`] and never looks past the trait.

use crate::error::Result;
use crate::params::SynthesisParameters;
use atomic_float::AtomicF32;
use mixloom_granular::{GranularParameters, GranularSynthesizer};
use mixloom_phrase::PhraseGraphPlayer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Granular,
    /// Phrase-graph playback
    Concatenative,
    Neural,
    /// Granular and phrase-graph output mixed together
    Hybrid,
}

impl BackendKind {
    pub fn all() -> [BackendKind; 4] {
        [
            BackendKind::Granular,
            BackendKind::Concatenative,
            BackendKind::Neural,
            BackendKind::Hybrid,
        ]
    }

    /// What must be loaded before the backend can start.
    pub fn requirement(&self) -> &'static str {
        match self {
            BackendKind::Granular => "no source loaded",
            BackendKind::Concatenative => "no phrase graph with audio loaded",
            BackendKind::Neural => "neural bridge is not running",
            BackendKind::Hybrid => "needs both a source and a phrase graph with audio",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            BackendKind::Granular => 1,
            BackendKind::Concatenative => 2,
            BackendKind::Neural => 3,
            BackendKind::Hybrid => 4,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(BackendKind::Granular),
            2 => Some(BackendKind::Concatenative),
            3 => Some(BackendKind::Neural),
            4 => Some(BackendKind::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Granular => write!(f, "granular"),
            BackendKind::Concatenative => write!(f, "concatenative"),
            BackendKind::Neural => write!(f, "neural"),
            BackendKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Capability set shared by all synthesis strategies.
///
/// `render` runs on the audio thread: it must not block on I/O and renders
/// silence rather than failing.
pub trait SynthBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn is_available(&self) -> bool;

    fn start(&self) -> Result<()>;

    fn stop(&self);

    fn set_parameters(&self, params: &SynthesisParameters);

    fn render(&self, left: &mut [f32], right: &mut [f32]);
}

pub struct GranularBackend {
    synth: GranularSynthesizer,
    base: GranularParameters,
}

impl GranularBackend {
    pub fn new(sample_rate: f64, base: GranularParameters) -> Self {
        let synth = GranularSynthesizer::new(sample_rate);
        synth.set_parameters(base.clone());
        Self { synth, base }
    }

    pub fn synth(&self) -> &GranularSynthesizer {
        &self.synth
    }
}

impl SynthBackend for GranularBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Granular
    }

    fn is_available(&self) -> bool {
        self.synth.has_source()
    }

    fn start(&self) -> Result<()> {
        Ok(self.synth.start()?)
    }

    fn stop(&self) {
        self.synth.stop();
    }

    fn set_parameters(&self, params: &SynthesisParameters) {
        self.synth.set_parameters(params.to_granular(&self.base));
    }

    fn render(&self, left: &mut [f32], right: &mut [f32]) {
        self.synth.render(left, right);
    }
}

pub struct ConcatenativeBackend {
    player: PhraseGraphPlayer,
}

impl ConcatenativeBackend {
    pub fn new(player: PhraseGraphPlayer) -> Self {
        Self { player }
    }

    pub fn player(&self) -> &PhraseGraphPlayer {
        &self.player
    }
}

impl SynthBackend for ConcatenativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Concatenative
    }

    fn is_available(&self) -> bool {
        self.player.has_graph() && self.player.song_count() > 0
    }

    fn start(&self) -> Result<()> {
        Ok(self.player.start()?)
    }

    fn stop(&self) {
        self.player.stop();
    }

    fn set_parameters(&self, params: &SynthesisParameters) {
        let current = self.player.parameters();
        self.player.set_parameters(params.to_player(&current));
    }

    fn render(&self, left: &mut [f32], right: &mut [f32]) {
        self.player.render(left, right);
    }
}

/// Largest block the hybrid mixer renders in one pass.
pub const MAX_BLOCK_FRAMES: usize = 8192;

/// Granular and phrase-graph output, crossfaded by `mix` (0 = all granular).
pub struct HybridBackend {
    granular: Arc<GranularBackend>,
    concatenative: Arc<ConcatenativeBackend>,
    mix: AtomicF32,
    scratch: Mutex<(Vec<f32>, Vec<f32>)>,
}

impl HybridBackend {
    pub fn new(
        granular: Arc<GranularBackend>,
        concatenative: Arc<ConcatenativeBackend>,
        mix: f32,
    ) -> Self {
        Self {
            granular,
            concatenative,
            mix: AtomicF32::new(mix.clamp(0.0, 1.0)),
            scratch: Mutex::new((vec![0.0; MAX_BLOCK_FRAMES], vec![0.0; MAX_BLOCK_FRAMES])),
        }
    }

    pub fn set_mix(&self, mix: f32) {
        self.mix.store(mix.clamp(0.0, 1.0), Ordering::Relaxed);
    }

    pub fn mix(&self) -> f32 {
        self.mix.load(Ordering::Relaxed)
    }
}

impl SynthBackend for HybridBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hybrid
    }

    fn is_available(&self) -> bool {
        self.granular.is_available() && self.concatenative.is_available()
    }

    fn start(&self) -> Result<()> {
        self.granular.start()?;
        if let Err(e) = self.concatenative.start() {
            self.granular.stop();
            return Err(e);
        }
        Ok(())
    }

    fn stop(&self) {
        self.concatenative.stop();
        self.granular.stop();
    }

    fn set_parameters(&self, params: &SynthesisParameters) {
        self.granular.set_parameters(params);
        self.concatenative.set_parameters(params);
    }

    /// Blocks longer than `MAX_BLOCK_FRAMES` are rendered in chunks.
    fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let mix = self.mix();
        let dry = 1.0 - mix;

        let mut scratch = self.scratch.lock();
        let (phrase_l, phrase_r) = &mut *scratch;
        for (left, right) in left[..frames]
            .chunks_mut(MAX_BLOCK_FRAMES)
            .zip(right[..frames].chunks_mut(MAX_BLOCK_FRAMES))
        {
            let n = left.len();
            self.granular.render(left, right);
            self.concatenative
                .render(&mut phrase_l[..n], &mut phrase_r[..n]);

            let phrase = phrase_l[..n].iter().zip(phrase_r[..n].iter());
            for ((l, r), (pl, pr)) in left.iter_mut().zip(right.iter_mut()).zip(phrase) {
                *l = *l * dry + pl * mix;
                *r = *r * dry + pr * mix;
            }
        }
    }
}

/// Mono output of the neural bridge, duplicated to both channels.
#[cfg(feature = "neural")]
pub struct NeuralBackend {
    bridge: mixloom_neural::NeuralBridge,
    reference_tempo: f64,
    active: std::sync::atomic::AtomicBool,
}

#[cfg(feature = "neural")]
impl NeuralBackend {
    pub fn new(bridge: mixloom_neural::NeuralBridge, reference_tempo: f64) -> Self {
        Self {
            bridge,
            reference_tempo,
            active: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn bridge(&self) -> &mixloom_neural::NeuralBridge {
        &self.bridge
    }
}

#[cfg(feature = "neural")]
impl SynthBackend for NeuralBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Neural
    }

    fn is_available(&self) -> bool {
        self.bridge.is_running()
    }

    fn start(&self) -> Result<()> {
        if !self.bridge.is_running() {
            return Err(mixloom_neural::BridgeError::NotRunning.into());
        }
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Stops rendering only; the bridge keeps its process until
    /// [`SynthesisEngine::stop_neural`](crate::SynthesisEngine::stop_neural).
    fn stop(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn set_parameters(&self, params: &SynthesisParameters) {
        self.bridge
            .update_controls(&params.to_neural(self.reference_tempo));
    }

    fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if !self.active.load(Ordering::Acquire) {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            return;
        }
        self.bridge.read_samples(&mut left[..frames]);
        right[..frames].copy_from_slice(&left[..frames]);
    }
}
