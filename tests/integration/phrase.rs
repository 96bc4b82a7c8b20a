//! Transitions and phrase-graph playback through the public API.

use crate::helpers::*;
use approx::assert_abs_diff_eq;
use mixloom::phrase::{is_near_beat, PhraseLink, PhraseNode, BEAT_TOLERANCE_SECS};
use mixloom::prelude::*;
use mixloom::TransitionEngine;
use std::io::Write;

fn crossfade_engine(bars: f64) -> TransitionEngine {
    let mut engine = TransitionEngine::new(TEST_SAMPLE_RATE);
    engine.configure(TransitionConfig {
        kind: TransitionType::Crossfade,
        duration_bars: bars,
        tempo: 120.0,
        ..Default::default()
    });
    engine
}

#[test]
fn test_two_bar_crossfade_length() {
    let mut engine = crossfade_engine(2.0);
    assert_eq!(engine.transition_samples(), 176_400);

    engine.start(false);
    let block = 4410;
    let outgoing = vec![(1.0, 1.0); block];
    let incoming = vec![(0.5, 0.5); block];
    let mut output = vec![(0.0, 0.0); block];

    for _ in 0..39 {
        engine.process(&outgoing, &incoming, &mut output);
        assert!(!engine.is_complete());
    }
    engine.process(&outgoing, &incoming, &mut output);
    assert!(engine.is_complete());
    assert_eq!(engine.current_sample(), 176_400);
    assert_abs_diff_eq!(engine.progress(), 1.0, epsilon = tolerances::FLOAT_EPSILON);
}

#[test]
fn test_crossfade_is_equal_power() {
    let engine = crossfade_engine(1.0);
    for p in [0.0f32, 0.25, 0.5, 0.75, 1.0] {
        let g = engine.gains_at(p);
        let power = g.outgoing_low * g.outgoing_low + g.incoming_low * g.incoming_low;
        assert_abs_diff_eq!(power, 1.0, epsilon = tolerances::GAIN_EPSILON);
    }
}

#[test]
fn test_eq_swap_quarter_gains() {
    let mut engine = TransitionEngine::new(TEST_SAMPLE_RATE);
    engine.configure(TransitionConfig {
        kind: TransitionType::EqSwap,
        ..Default::default()
    });

    let g = engine.gains_at(0.25);
    assert_abs_diff_eq!(g.outgoing_high, 0.85, epsilon = tolerances::GAIN_EPSILON);
    assert_abs_diff_eq!(g.incoming_high, 0.5, epsilon = tolerances::GAIN_EPSILON);
    assert_abs_diff_eq!(g.outgoing_low, 1.0, epsilon = tolerances::GAIN_EPSILON);
    assert_abs_diff_eq!(g.incoming_low, 0.0, epsilon = tolerances::GAIN_EPSILON);
}

#[test]
fn test_near_beat_rules() {
    let beats = [0.5, 1.0];
    assert!(is_near_beat(0.3, &beats, 0.35, BEAT_TOLERANCE_SECS));
    assert!(!is_near_beat(0.3, &beats, 4.0, BEAT_TOLERANCE_SECS));
    assert!(is_near_beat(0.96, &beats, 4.0, BEAT_TOLERANCE_SECS));
}

fn two_song_graph() -> PhraseGraph {
    let beats: Vec<f64> = (0..4).map(|b| b as f64 * 0.5).collect();
    let mut a1 = PhraseNode::new("a1", "a.wav", 0.0, 2.0);
    a1.beats = beats.clone();
    a1.links = vec![PhraseLink::new("b1", 0.9)];
    let mut a2 = PhraseNode::new("a2", "a.wav", 2.0, 4.0);
    a2.beats = beats.clone();
    let mut b1 = PhraseNode::new("b1", "b.wav", 0.0, 2.0);
    b1.beats = beats;
    PhraseGraph::new(vec![a1, a2, b1]).unwrap()
}

#[test]
fn test_concatenative_backend_plays_graph() {
    let engine = test_engine();
    engine.player().set_parameters(PlayerParameters {
        auto_advance: false,
        ..Default::default()
    });
    engine.load_graph(two_song_graph());
    assert!(!engine.is_available(BackendKind::Concatenative));

    let len = (4.0 * TEST_SAMPLE_RATE) as usize;
    engine
        .load_song("a.wav", mono_source(vec![0.5; len], TEST_SAMPLE_RATE))
        .unwrap();
    engine
        .load_song("b.wav", mono_source(vec![-0.5; len], TEST_SAMPLE_RATE))
        .unwrap();
    assert!(engine.is_available(BackendKind::Concatenative));

    engine.set_backend(BackendKind::Concatenative).unwrap();
    assert_eq!(engine.player().current_phrase().as_deref(), Some("a1"));

    let (left, right) = render_blocks(TEST_BUFFER_SIZE * 8, |l, r| engine.render(l, r));
    assert!(left.iter().all(|&s| (s - 0.5).abs() < tolerances::FLOAT_EPSILON));
    assert_eq!(left, right);

    let candidates = engine.player().next_candidates(2);
    assert!(!candidates.is_empty());
    assert!(candidates.windows(2).all(|w| w[0].total >= w[1].total));
}

#[test]
fn test_graph_file_round_trip() {
    let json = two_song_graph().to_json().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let engine = test_engine();
    engine.load_graph_file(file.path()).unwrap();
    assert!(engine.player().has_graph());
    assert_eq!(engine.player().phrase_count(), 3);
}

#[test]
fn test_graph_file_missing() {
    let engine = test_engine();
    let dir = tempfile::tempdir().unwrap();
    assert!(engine.load_graph_file(dir.path().join("nope.json")).is_err());
    assert!(!engine.player().has_graph());
}
