//! Granular synthesizer: grain scheduling, mixing and scan evolution.

use crate::evolution::ScanPosition;
use crate::grain::{Grain, GrainArena, GrainInfo};
use crate::params::GranularParameters;
use arc_swap::ArcSwap;
use atomic_float::AtomicF64;
use mixloom_core::{Error, Result, SourceBuffer, SourceId};
use mixloom_dsp::{constant_power_pan, soft_clip, OnePole, WindowTable};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct LoadedSource {
    id: SourceId,
    buffer: Arc<SourceBuffer>,
}

/// Render-thread state. Only `render`, `start` and `stop` lock it.
struct Voice {
    grains: GrainArena,
    scan: ScanPosition,
    last_position: f64,
    samples_since_last: f64,
    rng: SmallRng,
    filter_l: OnePole,
    filter_r: OnePole,
    filter_cutoff: f64,
}

impl Voice {
    fn new(params: &GranularParameters, sample_rate: f64) -> Self {
        Self {
            grains: GrainArena::new(),
            scan: ScanPosition::new(params.position),
            last_position: params.position,
            samples_since_last: f64::INFINITY,
            rng: match params.seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_entropy(),
            },
            filter_l: OnePole::new(params.smoothing_cutoff, sample_rate),
            filter_r: OnePole::new(params.smoothing_cutoff, sample_rate),
            filter_cutoff: params.smoothing_cutoff,
        }
    }

    fn sync_params(&mut self, params: &GranularParameters, sample_rate: f64) {
        if params.position != self.last_position {
            self.scan.set(params.position);
            self.last_position = params.position;
        }
        if params.smoothing_cutoff != self.filter_cutoff {
            self.filter_l.set_cutoff(params.smoothing_cutoff, sample_rate);
            self.filter_r.set_cutoff(params.smoothing_cutoff, sample_rate);
            self.filter_cutoff = params.smoothing_cutoff;
        }
    }

    /// Re-resolve grain slots against the current snapshot and drop grains
    /// whose source was removed or replaced by a shorter buffer.
    fn revalidate(&mut self, sources: &[LoadedSource]) {
        self.grains.retain(|grain| {
            let slot = if sources.get(grain.slot).map(|s| s.id) == Some(grain.source) {
                grain.slot
            } else {
                match sources.iter().position(|s| s.id == grain.source) {
                    Some(slot) => slot,
                    None => return false,
                }
            };
            grain.slot = slot;

            let len = sources[slot].buffer.len();
            let last_read = grain.start + grain.length.saturating_sub(1) as f64 * grain.rate;
            len > 0 && last_read <= (len - 1) as f64
        });
    }

    fn schedule(&mut self, sources: &[LoadedSource], params: &GranularParameters, sample_rate: f64) {
        if sources.is_empty() {
            return;
        }
        let slot = if sources.len() == 1 {
            0
        } else {
            self.rng.gen_range(0..sources.len())
        };
        let source = &sources[slot];
        let buffer = &source.buffer;
        let len = buffer.len();
        if len < 2 {
            return;
        }
        let last = (len - 1) as f64;

        let pitch_factor = 1.0 + jitter(&mut self.rng, params.pitch_jitter);
        let rate = params.pitch * pitch_factor * buffer.sample_rate() / sample_rate;

        let mut length = ((params.grain_size * sample_rate).round() as usize).max(1);
        if (length - 1) as f64 * rate > last {
            length = (last / rate).floor() as usize + 1;
        }
        let span = (length - 1) as f64 * rate;

        let normalized = (self.scan.get() + jitter(&mut self.rng, params.position_jitter))
            .rem_euclid(1.0);
        let mut position = normalized * last;
        if params.rhythm_alignment > 0.0 {
            if let Some(onset) = nearest_onset(buffer.onsets(), position) {
                position += (onset as f64 - position) * params.rhythm_alignment;
            }
        }
        let start = position.clamp(0.0, (last - span).max(0.0));

        let pan = jitter(&mut self.rng, params.pan_spread as f64) as f32;

        // Over the cap the request is dropped
        self.grains.try_push(
            Grain {
                source: source.id,
                slot,
                start,
                length,
                rate,
                gains: constant_power_pan(pan),
                amplitude: params.amplitude,
                window: params.window,
                cursor: 0,
            },
            params.max_grains,
        );
    }

    #[inline]
    fn mix_frame(&mut self, sources: &[LoadedSource], windows: &WindowTable) -> (f32, f32) {
        let mut left = 0.0;
        let mut right = 0.0;
        let mut i = 0;
        while i < self.grains.len() {
            let grain = self.grains.get_mut(i);
            let sample = sources[grain.slot]
                .buffer
                .mono_interpolated(grain.source_position());
            let env = windows.lookup(grain.window, grain.cursor, grain.length);
            let contribution = sample * env * grain.amplitude;
            left += contribution * grain.gains.0;
            right += contribution * grain.gains.1;

            grain.cursor += 1;
            if grain.cursor >= grain.length {
                self.grains.swap_remove(i);
            } else {
                i += 1;
            }
        }
        (left, right)
    }
}

/// Uniform value in `[-width, width]`, zero when width is zero.
#[inline]
fn jitter(rng: &mut SmallRng, width: f64) -> f64 {
    if width > 0.0 {
        rng.gen_range(-width..=width)
    } else {
        0.0
    }
}

/// Closest onset to `position` (sorted input).
fn nearest_onset(onsets: &[usize], position: f64) -> Option<usize> {
    if onsets.is_empty() {
        return None;
    }
    let idx = onsets.partition_point(|&o| (o as f64) < position);
    let after = onsets.get(idx).copied();
    let before = idx.checked_sub(1).map(|i| onsets[i]);
    match (before, after) {
        (Some(b), Some(a)) => {
            if position - b as f64 <= a as f64 - position {
                Some(b)
            } else {
                Some(a)
            }
        }
        (b, a) => b.or(a),
    }
}

/// Granular synthesizer over any number of shared sources.
pub struct GranularSynthesizer {
    sample_rate: f64,
    sources: ArcSwap<Vec<LoadedSource>>,
    params: ArcSwap<GranularParameters>,
    windows: WindowTable,
    voice: Mutex<Voice>,
    running: AtomicBool,
    active_grains: AtomicUsize,
    scan_position: AtomicF64,
}

impl GranularSynthesizer {
    pub fn new(sample_rate: f64) -> Self {
        let params = GranularParameters::default();
        Self {
            sample_rate,
            sources: ArcSwap::from_pointee(Vec::new()),
            voice: Mutex::new(Voice::new(&params, sample_rate)),
            scan_position: AtomicF64::new(params.position),
            params: ArcSwap::from_pointee(params),
            windows: WindowTable::new(),
            running: AtomicBool::new(false),
            active_grains: AtomicUsize::new(0),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Register a source under `id`, replacing any previous one.
    ///
    /// Runs onset detection and tempo estimation if the buffer carries none.
    pub fn load_source(&self, buffer: SourceBuffer, id: SourceId) -> Arc<SourceBuffer> {
        let buffer = if buffer.has_analysis() || buffer.is_empty() {
            buffer
        } else {
            let analysis = mixloom_analysis::analyze(&buffer.to_mono(), buffer.sample_rate());
            let positions = analysis.positions();
            buffer.with_onsets(positions, analysis.tempo)
        };
        let shared = Arc::new(buffer);
        self.load_shared(Arc::clone(&shared), id);
        shared
    }

    /// Register an already analyzed shared buffer.
    pub fn load_shared(&self, buffer: Arc<SourceBuffer>, id: SourceId) {
        if buffer.is_empty() {
            tracing::warn!("{id} is empty, grains from it will be silent");
        }
        tracing::info!(
            "Loaded {id}: {:.2}s, {} onsets, tempo {:?}",
            buffer.duration_secs(),
            buffer.onsets().len(),
            buffer.tempo()
        );
        self.sources.rcu(|current| {
            let mut next: Vec<LoadedSource> =
                current.iter().filter(|s| s.id != id).cloned().collect();
            next.push(LoadedSource {
                id,
                buffer: Arc::clone(&buffer),
            });
            next
        });
    }

    /// Unregister a source. Grains reading from it end at the next block.
    pub fn remove_source(&self, id: SourceId) -> bool {
        let mut removed = false;
        self.sources.rcu(|current| {
            let next: Vec<LoadedSource> = current.iter().filter(|s| s.id != id).cloned().collect();
            removed = next.len() != current.len();
            next
        });
        if removed {
            tracing::debug!("Removed {id}");
        }
        removed
    }

    pub fn source_count(&self) -> usize {
        self.sources.load().len()
    }

    pub fn has_source(&self) -> bool {
        !self.sources.load().is_empty()
    }

    /// Tempo of the first loaded source, if detected.
    pub fn source_tempo(&self) -> Option<f64> {
        self.sources.load().first().and_then(|s| s.buffer.tempo())
    }

    /// Publish a new parameter snapshot (sanitized).
    pub fn set_parameters(&self, params: GranularParameters) {
        self.params.store(Arc::new(params.sanitized()));
    }

    pub fn parameters(&self) -> GranularParameters {
        GranularParameters::clone(&self.params.load())
    }

    pub fn start(&self) -> Result<()> {
        if !self.has_source() {
            return Err(Error::NoSource);
        }
        let params = self.params.load();
        {
            let mut voice = self.voice.lock();
            *voice = Voice::new(&params, self.sample_rate);
        }
        self.running.store(true, Ordering::Release);
        tracing::info!("Granular synthesizer started ({} sources)", self.source_count());
        Ok(())
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            self.voice.lock().grains.clear();
            self.active_grains.store(0, Ordering::Relaxed);
            tracing::info!("Granular synthesizer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn active_grain_count(&self) -> usize {
        self.active_grains.load(Ordering::Relaxed)
    }

    /// Normalized scan position after the last rendered block.
    pub fn scan_position(&self) -> f64 {
        self.scan_position.load(Ordering::Relaxed)
    }

    /// Snapshot of active grains (allocates; not for the render thread).
    pub fn inspect_grains(&self) -> Vec<GrainInfo> {
        self.voice
            .lock()
            .grains
            .iter()
            .map(|g| GrainInfo {
                source: g.source,
                start: g.start,
                cursor: g.cursor,
                length: g.length,
                source_position: g.source_position(),
            })
            .collect()
    }

    /// Render one stereo block. Silence when stopped or nothing is loaded.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        if !self.running.load(Ordering::Acquire) {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }

        let sources = self.sources.load();
        let params = self.params.load();
        let mut voice = self.voice.lock();
        voice.sync_params(&params, self.sample_rate);
        voice.revalidate(&sources);

        let source_tempo = sources.first().and_then(|s| s.buffer.tempo());
        let density = params.effective_density(source_tempo);
        let interval = if density > 0.0 {
            self.sample_rate / density
        } else {
            f64::INFINITY
        };

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            voice.samples_since_last += 1.0;
            if voice.samples_since_last > interval {
                voice.samples_since_last = 0.0;
                voice.schedule(&sources, &params, self.sample_rate);
            }
            let (dry_l, dry_r) = voice.mix_frame(&sources, &self.windows);
            *l = soft_clip(voice.filter_l.process(dry_l));
            *r = soft_clip(voice.filter_r.process(dry_r));
        }

        let Voice { scan, rng, .. } = &mut *voice;
        scan.advance(
            params.evolution_mode,
            params.position_evolution,
            frames,
            self.sample_rate,
            rng,
        );
        self.active_grains.store(voice.grains.len(), Ordering::Relaxed);
        self.scan_position.store(voice.scan.get(), Ordering::Relaxed);
    }
}
