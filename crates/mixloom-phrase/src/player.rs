//! Phrase-graph player.
//!
//! Plays the song buffer behind the current phrase sample-by-sample. At a
//! phrase boundary the next consecutive phrase takes over with no mixing.
//! A queued phrase elsewhere in the same song is a direct seek; one in a
//! different song waits for a beat and is blended by the [`TransitionEngine`].

use crate::error::{Error, Result};
use crate::graph::PhraseGraph;
use crate::scoring::{rank_candidates, CandidateScore, ScoringOptions};
use crate::transition::{TransitionConfig, TransitionEngine};
use arc_swap::{ArcSwap, ArcSwapOption};
use mixloom_core::{SourceBuffer, StereoFrame};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Distance from a beat that counts as "on the beat", in seconds.
pub const BEAT_TOLERANCE_SECS: f64 = 0.05;

/// Distance from the phrase end that counts as a boundary, in seconds.
pub const PHRASE_END_TOLERANCE_SECS: f64 = 0.1;

const SILENCE: StereoFrame = (0.0, 0.0);

/// True within `tolerance` of any beat, or from 100 ms before the phrase end
/// onwards.
///
/// `current_time` and `beats` are seconds relative to the phrase start;
/// `beats` must be sorted. Playback that has run past the end (after a
/// transition longer than the phrase) is always at a boundary.
pub fn is_near_beat(current_time: f64, beats: &[f64], phrase_duration: f64, tolerance: f64) -> bool {
    if phrase_duration > 0.0 && current_time >= phrase_duration - PHRASE_END_TOLERANCE_SECS {
        return true;
    }
    let idx = beats.partition_point(|&b| b < current_time);
    let near = |i: usize| {
        beats
            .get(i)
            .is_some_and(|&b| (b - current_time).abs() <= tolerance)
    };
    near(idx) || (idx > 0 && near(idx - 1))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerParameters {
    pub scoring: ScoringOptions,
    /// Used for cross-song branches; tempo is replaced by the outgoing phrase's
    pub transition: TransitionConfig,
    /// Prefer the link's suggested transition type over `transition.kind`
    pub use_suggested_transitions: bool,
    /// Branch on downbeats instead of any beat when the phrase has them
    pub wait_for_downbeat: bool,
    /// Background selector queues the best candidate near each phrase end
    pub auto_advance: bool,
    /// How close to the phrase end the selector picks the next phrase
    pub selection_lookahead_secs: f64,
    pub selector_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for PlayerParameters {
    fn default() -> Self {
        Self {
            scoring: ScoringOptions::default(),
            transition: TransitionConfig::default(),
            use_suggested_transitions: true,
            wait_for_downbeat: false,
            auto_advance: true,
            selection_lookahead_secs: 2.0,
            selector_interval_ms: 50,
            seed: None,
        }
    }
}

struct LoadedGraph {
    graph: PhraseGraph,
    /// Fallback successor per node: original sequence, else best deterministic score
    default_next: Vec<Option<usize>>,
}

impl LoadedGraph {
    fn new(graph: PhraseGraph) -> Self {
        let options = ScoringOptions {
            jitter: 0.0,
            ..Default::default()
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let default_next = (0..graph.len())
            .map(|i| {
                graph.successor(i).or_else(|| {
                    rank_candidates(&graph, i, &options, &mut rng)
                        .first()
                        .map(|c| c.index)
                })
            })
            .collect();
        Self {
            graph,
            default_next,
        }
    }
}

struct ActiveBranch {
    target: usize,
    song: Arc<SourceBuffer>,
    position: usize,
}

/// Playback position and transition progress, guarded by one lock.
struct PlaybackState {
    current: Option<usize>,
    queued: Option<usize>,
    song: Option<Arc<SourceBuffer>>,
    /// Sample index in `song`
    position: usize,
    transition_pending: bool,
    crossfade_progress: f32,
    branch: Option<ActiveBranch>,
    engine: TransitionEngine,
}

impl PlaybackState {
    fn new(sample_rate: f64) -> Self {
        Self {
            current: None,
            queued: None,
            song: None,
            position: 0,
            transition_pending: false,
            crossfade_progress: 0.0,
            branch: None,
            engine: TransitionEngine::new(sample_rate),
        }
    }

    fn clear(&mut self) {
        self.current = None;
        self.queued = None;
        self.song = None;
        self.position = 0;
        self.transition_pending = false;
        self.crossfade_progress = 0.0;
        self.branch = None;
        self.engine.reset();
    }
}

type SongMap = HashMap<String, Arc<SourceBuffer>>;

#[inline]
fn secs_to_samples(secs: f64, sample_rate: f64) -> usize {
    (secs.max(0.0) * sample_rate).round() as usize
}

#[inline]
fn read_frame(song: &SourceBuffer, position: usize) -> StereoFrame {
    if position < song.len() {
        song.frame_at(position)
    } else {
        SILENCE
    }
}

struct PlayerShared {
    sample_rate: f64,
    graph: ArcSwapOption<LoadedGraph>,
    songs: ArcSwap<SongMap>,
    params: ArcSwap<PlayerParameters>,
    state: Mutex<PlaybackState>,
    running: AtomicBool,
}

impl PlayerShared {
    fn render(&self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if !self.running.load(Ordering::Acquire) {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            return;
        }

        let graph = self.graph.load();
        let Some(loaded) = graph.as_ref() else {
            left[..frames].fill(0.0);
            right[..frames].fill(0.0);
            return;
        };
        let songs = self.songs.load();
        let params = self.params.load();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        for (l, r) in left[..frames].iter_mut().zip(right[..frames].iter_mut()) {
            let (fl, fr) = next_frame(state, loaded, &songs, &params);
            *l = fl;
            *r = fr;
        }
        if state.branch.is_some() {
            state.crossfade_progress = state.engine.progress();
            state.engine.notify_progress();
        }
    }
}

fn next_frame(
    state: &mut PlaybackState,
    loaded: &LoadedGraph,
    songs: &SongMap,
    params: &PlayerParameters,
) -> StereoFrame {
    if let Some(branch) = state.branch.as_mut() {
        let outgoing = state
            .song
            .as_deref()
            .map_or(SILENCE, |s| read_frame(s, state.position));
        let incoming = read_frame(&branch.song, branch.position);
        let out = state.engine.process_frame(outgoing, incoming);
        state.position += 1;
        branch.position += 1;
        if state.engine.is_complete() {
            finish_branch(state, &loaded.graph);
        }
        return out;
    }

    let graph = &loaded.graph;
    let Some(cur) = state.current else {
        return SILENCE;
    };
    let (Some(node), Some(song)) = (graph.node_at(cur), state.song.as_deref()) else {
        return SILENCE;
    };

    let sample_rate = song.sample_rate();
    let phrase_start = secs_to_samples(node.start_time, sample_rate);
    let phrase_end = secs_to_samples(node.end_time, sample_rate).min(song.len());
    let frame = read_frame(song, state.position);
    state.position += 1;

    if let Some(target) = state.queued {
        if !graph.is_sequential(cur, target) {
            let time_in_phrase = state.position.saturating_sub(phrase_start) as f64 / sample_rate;
            try_branch(state, graph, songs, params, cur, target, time_in_phrase);
        }
    }

    if state.branch.is_none() && state.current == Some(cur) && state.position >= phrase_end {
        advance_phrase(state, loaded, songs, cur, phrase_start);
    }
    frame
}

fn try_branch(
    state: &mut PlaybackState,
    graph: &PhraseGraph,
    songs: &SongMap,
    params: &PlayerParameters,
    cur: usize,
    target: usize,
    time_in_phrase: f64,
) {
    let (Some(node), Some(target_node)) = (graph.node_at(cur), graph.node_at(target)) else {
        state.queued = None;
        state.transition_pending = false;
        return;
    };

    if target_node.audio_file == node.audio_file {
        let sample_rate = state.song.as_ref().map_or(1.0, |s| s.sample_rate());
        state.current = Some(target);
        state.position = secs_to_samples(target_node.start_time, sample_rate);
        state.queued = None;
        state.transition_pending = false;
        tracing::debug!("Seek {} -> {} within {}", node.id, target_node.id, node.audio_file);
        return;
    }

    state.transition_pending = true;
    let grid = if params.wait_for_downbeat && !node.downbeats.is_empty() {
        &node.downbeats
    } else {
        &node.beats
    };
    if !is_near_beat(time_in_phrase, grid, node.length_secs(), BEAT_TOLERANCE_SECS) {
        return;
    }

    state.queued = None;
    state.transition_pending = false;
    let Some(song) = songs.get(&target_node.audio_file) else {
        tracing::warn!(
            "No audio for {}, skipping branch {} -> {}",
            target_node.audio_file,
            node.id,
            target_node.id
        );
        return;
    };

    let kind = if params.use_suggested_transitions {
        node.link_to(&target_node.id)
            .and_then(|l| l.suggested_transition)
            .unwrap_or(params.transition.kind)
    } else {
        params.transition.kind
    };
    let config = TransitionConfig {
        kind,
        tempo: if node.tempo > 0.0 {
            node.tempo
        } else {
            params.transition.tempo
        },
        ..params.transition
    };
    state.engine.configure(config);
    state.engine.start(false);
    state.crossfade_progress = 0.0;
    state.branch = Some(ActiveBranch {
        target,
        song: Arc::clone(song),
        position: secs_to_samples(target_node.start_time, song.sample_rate()),
    });
    tracing::debug!(
        "Branch {} -> {} ({:?}, {} samples)",
        node.id,
        target_node.id,
        kind,
        state.engine.transition_samples()
    );
}

fn finish_branch(state: &mut PlaybackState, graph: &PhraseGraph) {
    let Some(branch) = state.branch.take() else {
        return;
    };
    state.crossfade_progress = 1.0;
    state.engine.notify_progress();
    state.engine.reset();
    let current = containing_phrase(graph, branch.target, branch.position, branch.song.sample_rate());
    state.song = Some(branch.song);
    state.position = branch.position;
    state.current = Some(current);
    state.crossfade_progress = 0.0;
    if let Some(node) = graph.node_at(current) {
        tracing::debug!("Now playing {}", node.id);
    }
}

/// Follow consecutive phrases from `start` to the one that holds `position`.
///
/// A transition can outlast the phrase it branched into; playback then
/// resumes in whichever later phrase of that song it reached.
fn containing_phrase(graph: &PhraseGraph, start: usize, position: usize, sample_rate: f64) -> usize {
    let mut current = start;
    for _ in 0..graph.len() {
        let Some(node) = graph.node_at(current) else {
            break;
        };
        if position < secs_to_samples(node.end_time, sample_rate) {
            break;
        }
        match graph.successor(current) {
            Some(next) if graph.is_sequential(current, next) => current = next,
            _ => break,
        }
    }
    current
}

/// Phrase boundary reached with no branch in flight.
fn advance_phrase(
    state: &mut PlaybackState,
    loaded: &LoadedGraph,
    songs: &SongMap,
    cur: usize,
    phrase_start: usize,
) {
    let graph = &loaded.graph;
    let next = match state.queued {
        Some(q) if graph.is_sequential(cur, q) => {
            state.queued = None;
            Some(q)
        }
        // Cross-song branch pending; any point past the end is a boundary
        Some(_) => return,
        None => loaded.default_next.get(cur).copied().flatten(),
    };

    let (Some(node), Some(next_node)) = (graph.node_at(cur), next.and_then(|n| graph.node_at(n)))
    else {
        state.position = phrase_start;
        return;
    };
    let Some(next) = next else {
        return;
    };

    if next_node.audio_file == node.audio_file {
        if !graph.is_sequential(cur, next) {
            let sample_rate = state.song.as_ref().map_or(1.0, |s| s.sample_rate());
            state.position = secs_to_samples(next_node.start_time, sample_rate);
        }
        state.current = Some(next);
    } else if songs.contains_key(&next_node.audio_file) {
        state.queued = Some(next);
    } else {
        tracing::warn!(
            "No audio for {}, looping {}",
            next_node.audio_file,
            node.id
        );
        state.position = phrase_start;
    }
}

fn run_selector(shared: Arc<PlayerShared>) {
    let seed = shared.params.load().seed;
    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    while shared.running.load(Ordering::Acquire) {
        let params = shared.params.load_full();
        thread::sleep(Duration::from_millis(params.selector_interval_ms.max(1)));
        if !params.auto_advance {
            continue;
        }
        let Some(loaded) = shared.graph.load_full() else {
            continue;
        };

        let cur = {
            let state = shared.state.lock();
            if state.queued.is_some() || state.branch.is_some() {
                continue;
            }
            let (Some(cur), Some(song)) = (state.current, state.song.as_ref()) else {
                continue;
            };
            let Some(node) = loaded.graph.node_at(cur) else {
                continue;
            };
            let remaining = node.end_time - state.position as f64 / song.sample_rate();
            if remaining > params.selection_lookahead_secs {
                continue;
            }
            cur
        };

        let songs = shared.songs.load();
        let choice = rank_candidates(&loaded.graph, cur, &params.scoring, &mut rng)
            .into_iter()
            .find(|c| {
                loaded
                    .graph
                    .node_at(c.index)
                    .is_some_and(|n| songs.contains_key(&n.audio_file))
            })
            .map(|c| c.index)
            .or_else(|| loaded.default_next.get(cur).copied().flatten());

        if let Some(choice) = choice {
            let mut state = shared.state.lock();
            if state.current == Some(cur) && state.queued.is_none() && state.branch.is_none() {
                state.queued = Some(choice);
                tracing::debug!("Auto-queued {}", loaded.graph.nodes[choice].id);
            }
        }
    }
}

/// Plays through a phrase graph, branching between songs on the beat.
pub struct PhraseGraphPlayer {
    shared: Arc<PlayerShared>,
    selector: Mutex<Option<JoinHandle<()>>>,
}

impl PhraseGraphPlayer {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            shared: Arc::new(PlayerShared {
                sample_rate,
                graph: ArcSwapOption::empty(),
                songs: ArcSwap::from_pointee(HashMap::new()),
                params: ArcSwap::from_pointee(PlayerParameters::default()),
                state: Mutex::new(PlaybackState::new(sample_rate)),
                running: AtomicBool::new(false),
            }),
            selector: Mutex::new(None),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.shared.sample_rate
    }

    /// Replace the graph. Stops playback if running.
    pub fn load_graph(&self, graph: PhraseGraph) {
        if self.is_running() {
            tracing::info!("Graph replaced while playing, stopping player");
            self.stop();
        }
        let phrases = graph.len();
        let songs = graph.songs().len();
        self.shared.graph.store(Some(Arc::new(LoadedGraph::new(graph))));
        self.shared.state.lock().clear();
        tracing::info!("Loaded phrase graph: {phrases} phrases across {songs} songs");
    }

    pub fn has_graph(&self) -> bool {
        self.shared
            .graph
            .load()
            .as_ref()
            .is_some_and(|g| !g.graph.is_empty())
    }

    pub fn phrase_count(&self) -> usize {
        self.shared.graph.load().as_ref().map_or(0, |g| g.graph.len())
    }

    /// Run `f` against the loaded graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&PhraseGraph) -> R) -> Option<R> {
        self.shared.graph.load().as_ref().map(|g| f(&g.graph))
    }

    /// Register decoded audio for an `audioFile` referenced by the graph.
    pub fn load_song(&self, audio_file: impl Into<String>, buffer: SourceBuffer) -> Result<Arc<SourceBuffer>> {
        let audio_file = audio_file.into();
        if buffer.is_empty() {
            return Err(mixloom_core::Error::EmptySource(audio_file).into());
        }
        if (buffer.sample_rate() - self.shared.sample_rate).abs() > f64::EPSILON {
            tracing::warn!(
                "{audio_file} is {} Hz, player runs at {} Hz; it will play off-speed",
                buffer.sample_rate(),
                self.shared.sample_rate
            );
        }
        let shared = Arc::new(buffer);
        self.shared.songs.rcu(|current| {
            let mut next = SongMap::clone(current);
            next.insert(audio_file.clone(), Arc::clone(&shared));
            next
        });
        tracing::debug!("Loaded song {audio_file} ({:.1}s)", shared.duration_secs());
        Ok(shared)
    }

    pub fn remove_song(&self, audio_file: &str) -> bool {
        let mut removed = false;
        self.shared.songs.rcu(|current| {
            let mut next = SongMap::clone(current);
            removed = next.remove(audio_file).is_some();
            next
        });
        removed
    }

    pub fn has_song(&self, audio_file: &str) -> bool {
        self.shared.songs.load().contains_key(audio_file)
    }

    pub fn song_count(&self) -> usize {
        self.shared.songs.load().len()
    }

    pub fn set_parameters(&self, params: PlayerParameters) {
        self.shared.params.store(Arc::new(params));
    }

    pub fn parameters(&self) -> PlayerParameters {
        PlayerParameters::clone(&self.shared.params.load())
    }

    /// Called with transition progress after every rendered block of a branch.
    pub fn set_progress_callback(&self, callback: impl FnMut(f32) + Send + 'static) {
        self.shared.state.lock().engine.set_progress_callback(callback);
    }

    /// Start at the first phrase whose song is loaded.
    pub fn start(&self) -> Result<()> {
        let loaded = self.loaded_graph()?;
        let songs = self.shared.songs.load();
        let first = loaded
            .graph
            .nodes
            .iter()
            .position(|n| songs.contains_key(&n.audio_file))
            .ok_or_else(|| Error::MissingAudio(loaded.graph.nodes[0].audio_file.clone()))?;
        self.start_at(&loaded, first)
    }

    /// Start at a specific phrase.
    pub fn start_from(&self, phrase_id: &str) -> Result<()> {
        let loaded = self.loaded_graph()?;
        let index = loaded
            .graph
            .index_of(phrase_id)
            .ok_or_else(|| Error::UnknownPhrase(phrase_id.to_string()))?;
        self.start_at(&loaded, index)
    }

    fn loaded_graph(&self) -> Result<Arc<LoadedGraph>> {
        match self.shared.graph.load_full() {
            Some(loaded) if !loaded.graph.is_empty() => Ok(loaded),
            _ => Err(Error::NoGraph),
        }
    }

    fn start_at(&self, loaded: &LoadedGraph, index: usize) -> Result<()> {
        if self.is_running() {
            self.stop();
        }
        let node = &loaded.graph.nodes[index];
        let song = self
            .shared
            .songs
            .load()
            .get(&node.audio_file)
            .cloned()
            .ok_or_else(|| Error::MissingAudio(node.audio_file.clone()))?;

        {
            let mut state = self.shared.state.lock();
            state.clear();
            state.position = secs_to_samples(node.start_time, song.sample_rate());
            state.song = Some(song);
            state.current = Some(index);
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("phrase-selector".into())
            .spawn(move || run_selector(shared))?;
        *self.selector.lock() = Some(handle);

        tracing::info!("Phrase player started at {}", node.id);
        Ok(())
    }

    /// Stop rendering, then join the selector thread.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.selector.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Phrase selector thread panicked");
            }
        }
        self.shared.state.lock().clear();
        tracing::info!("Phrase player stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Queue a phrase to play next.
    ///
    /// Consecutive phrases swap at the boundary, same-song phrases seek,
    /// other songs branch on the next beat.
    pub fn queue_phrase(&self, phrase_id: &str) -> Result<()> {
        let loaded = self.loaded_graph()?;
        let index = loaded
            .graph
            .index_of(phrase_id)
            .ok_or_else(|| Error::UnknownPhrase(phrase_id.to_string()))?;
        let mut state = self.shared.state.lock();
        state.queued = Some(index);
        state.transition_pending = false;
        tracing::debug!("Queued {phrase_id}");
        Ok(())
    }

    /// Top `count` scored successors of the current phrase.
    pub fn next_candidates(&self, count: usize) -> Vec<CandidateScore> {
        let Some(loaded) = self.shared.graph.load_full() else {
            return Vec::new();
        };
        let Some(cur) = self.shared.state.lock().current else {
            return Vec::new();
        };
        let params = self.shared.params.load();
        let mut rng = SmallRng::from_entropy();
        let mut ranked = rank_candidates(&loaded.graph, cur, &params.scoring, &mut rng);
        ranked.truncate(count);
        ranked
    }

    pub fn current_phrase(&self) -> Option<String> {
        let current = self.shared.state.lock().current?;
        self.with_graph(|g| g.node_at(current).map(|n| n.id.clone()))
            .flatten()
    }

    pub fn queued_phrase(&self) -> Option<String> {
        let queued = self.shared.state.lock().queued?;
        self.with_graph(|g| g.node_at(queued).map(|n| n.id.clone()))
            .flatten()
    }

    /// Position in the current song, in seconds.
    pub fn position_secs(&self) -> f64 {
        let state = self.shared.state.lock();
        state
            .song
            .as_ref()
            .map_or(0.0, |s| state.position as f64 / s.sample_rate())
    }

    pub fn is_transitioning(&self) -> bool {
        self.shared.state.lock().branch.is_some()
    }

    pub fn transition_pending(&self) -> bool {
        self.shared.state.lock().transition_pending
    }

    pub fn crossfade_progress(&self) -> f32 {
        self.shared.state.lock().crossfade_progress
    }

    /// Render one stereo block. Silence when stopped.
    pub fn render(&self, left: &mut [f32], right: &mut [f32]) {
        self.shared.render(left, right);
    }
}

impl Drop for PhraseGraphPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
