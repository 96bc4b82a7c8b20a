//! The synthesis engine façade.

use crate::backend::{
    BackendKind, ConcatenativeBackend, GranularBackend, HybridBackend, SynthBackend,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::params::SynthesisParameters;
use arc_swap::ArcSwap;
use mixloom_core::{SourceBuffer, SourceId};
use mixloom_granular::GranularSynthesizer;
use mixloom_phrase::{PhraseGraph, PhraseGraphPlayer};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[cfg(feature = "neural")]
use crate::backend::NeuralBackend;

const NO_BACKEND: u8 = 0;

/// Holds every backend and renders whichever one is active.
///
/// # Example
///
/// ```ignore
/// use mixloom::prelude::*;
///
/// let engine = SynthesisEngine::builder()
///     .sample_rate(44100.0)
///     .build()?;
///
/// engine.load_source(buffer, SourceId(0));
/// engine.set_backend(BackendKind::Granular)?;
/// engine.set_parameters(SynthesisParameters { density: 0.8, ..Default::default() });
///
/// // Audio callback
/// engine.render(&mut left, &mut right);
/// ```
pub struct SynthesisEngine {
    config: EngineConfig,
    granular: Arc<GranularBackend>,
    concatenative: Arc<ConcatenativeBackend>,
    hybrid: HybridBackend,
    #[cfg(feature = "neural")]
    neural: NeuralBackend,
    /// `BackendKind` tag, or `NO_BACKEND`
    current: AtomicU8,
    params: ArcSwap<SynthesisParameters>,
    /// Serializes backend switches
    switch: Mutex<()>,
}

impl SynthesisEngine {
    pub fn builder() -> crate::EngineBuilder {
        crate::EngineBuilder::default()
    }

    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let sample_rate = config.sample_rate;

        let granular = Arc::new(GranularBackend::new(sample_rate, config.granular.clone()));
        let player = PhraseGraphPlayer::new(sample_rate);
        player.set_parameters(config.player_parameters());
        let concatenative = Arc::new(ConcatenativeBackend::new(player));
        let hybrid = HybridBackend::new(
            Arc::clone(&granular),
            Arc::clone(&concatenative),
            config.hybrid_mix,
        );

        #[cfg(feature = "neural")]
        let neural = NeuralBackend::new(
            mixloom_neural::NeuralBridge::new(config.neural.clone()),
            config.reference_tempo,
        );

        tracing::info!("Synthesis engine ready at {sample_rate} Hz");
        Ok(Self {
            config,
            granular,
            concatenative,
            hybrid,
            #[cfg(feature = "neural")]
            neural,
            current: AtomicU8::new(NO_BACKEND),
            params: ArcSwap::from_pointee(SynthesisParameters::default()),
            switch: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn granular(&self) -> &GranularSynthesizer {
        self.granular.synth()
    }

    pub fn player(&self) -> &PhraseGraphPlayer {
        self.concatenative.player()
    }

    #[cfg(feature = "neural")]
    pub fn neural(&self) -> &mixloom_neural::NeuralBridge {
        self.neural.bridge()
    }

    // =========================================================================
    // Material
    // =========================================================================

    /// Add a grain source. Onsets are detected if the buffer has none.
    pub fn load_source(&self, buffer: SourceBuffer, id: SourceId) -> Arc<SourceBuffer> {
        self.granular().load_source(buffer, id)
    }

    pub fn load_graph(&self, graph: PhraseGraph) {
        self.player().load_graph(graph);
    }

    /// Load a phrase graph JSON file.
    pub fn load_graph_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::open(path.as_ref())?;
        let graph = PhraseGraph::from_reader(std::io::BufReader::new(file))?;
        self.load_graph(graph);
        Ok(())
    }

    /// Register decoded audio for an `audioFile` named in the graph.
    pub fn load_song(&self, audio_file: impl Into<String>, buffer: SourceBuffer) -> Result<()> {
        self.player().load_song(audio_file, buffer)?;
        Ok(())
    }

    // =========================================================================
    // Neural process
    // =========================================================================

    /// Start the neural bridge. Must be called inside a tokio runtime.
    #[cfg(feature = "neural")]
    pub async fn start_neural(&self) -> Result<()> {
        let neural_rate = self.neural().sample_rate();
        if (neural_rate - self.sample_rate()).abs() > 0.5 {
            tracing::warn!(
                "Neural server renders at {neural_rate} Hz, engine runs at {} Hz",
                self.sample_rate()
            );
        }
        self.neural().update_controls(
            &self.params.load().to_neural(self.config.reference_tempo),
        );
        self.neural().start().await?;
        Ok(())
    }

    /// Push current controls to the neural server without generating audio.
    #[cfg(feature = "neural")]
    pub async fn sync_neural_controls(&self) -> Result<()> {
        let controls = self.params.load().to_neural(self.config.reference_tempo);
        self.neural().set_controls(&controls).await?;
        Ok(())
    }

    /// Stop rendering neural audio, then shut the bridge down.
    #[cfg(feature = "neural")]
    pub fn stop_neural(&self) {
        let _switch = self.switch.lock();
        if self.current_backend() == Some(BackendKind::Neural) {
            self.current.store(NO_BACKEND, Ordering::Release);
        }
        self.neural.stop();
        self.neural().stop();
    }

    // =========================================================================
    // Backend selection
    // =========================================================================

    fn backend(&self, kind: BackendKind) -> Option<&dyn SynthBackend> {
        match kind {
            BackendKind::Granular => Some(&*self.granular),
            BackendKind::Concatenative => Some(&*self.concatenative),
            BackendKind::Hybrid => Some(&self.hybrid),
            #[cfg(feature = "neural")]
            BackendKind::Neural => Some(&self.neural),
            #[cfg(not(feature = "neural"))]
            BackendKind::Neural => None,
        }
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.backend(kind).is_some_and(|b| b.is_available())
    }

    pub fn current_backend(&self) -> Option<BackendKind> {
        BackendKind::from_tag(self.current.load(Ordering::Acquire))
    }

    /// Make `kind` the rendered backend.
    ///
    /// Fails without touching the current backend if `kind` has nothing to
    /// play. Otherwise the previous backend is stopped first.
    pub fn set_backend(&self, kind: BackendKind) -> Result<()> {
        let _switch = self.switch.lock();
        let previous = self.current_backend();
        if previous == Some(kind) {
            return Ok(());
        }

        let backend = match self.backend(kind) {
            Some(backend) if backend.is_available() => backend,
            Some(_) => {
                return Err(Error::BackendUnavailable {
                    backend: kind,
                    reason: kind.requirement().to_string(),
                })
            }
            None => {
                return Err(Error::BackendUnavailable {
                    backend: kind,
                    reason: "built without the `neural` feature".to_string(),
                })
            }
        };

        if let Some(previous) = previous.and_then(|p| self.backend(p)) {
            self.current.store(NO_BACKEND, Ordering::Release);
            previous.stop();
        }

        backend.set_parameters(&self.params.load());
        backend.start()?;
        self.current.store(kind.tag(), Ordering::Release);
        tracing::info!("Backend switched to {kind}");
        Ok(())
    }

    /// Stop the current backend; output becomes silence.
    pub fn stop(&self) {
        let _switch = self.switch.lock();
        let previous = self.current.swap(NO_BACKEND, Ordering::AcqRel);
        if let Some(backend) = BackendKind::from_tag(previous).and_then(|k| self.backend(k)) {
            backend.stop();
            tracing::info!("Backend {} stopped", backend.kind());
        }
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Publish parameters to every backend, so switching keeps the same feel.
    pub fn set_parameters(&self, params: SynthesisParameters) {
        for kind in BackendKind::all() {
            if let Some(backend) = self.backend(kind) {
                if kind != BackendKind::Hybrid {
                    backend.set_parameters(&params);
                }
            }
        }
        self.params.store(Arc::new(params));
    }

    pub fn parameters(&self) -> SynthesisParameters {
        SynthesisParameters::clone(&self.params.load())
    }

    pub fn set_hybrid_mix(&self, mix: f32) {
        self.hybrid.set_mix(mix);
    }

    pub fn hybrid_mix(&self) -> f32 {
        self.hybrid.mix()
    }

    // =========================================================================
    // Audio
    // =========================================================================

    /// Render one stereo block from the active backend; silence if none.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        match self
            .current_backend()
            .and_then(|kind| self.backend(kind))
        {
            Some(backend) => backend.render(left, right),
            None => {
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }
}

impl Drop for SynthesisEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
