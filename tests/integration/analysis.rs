//! Onset detection and tempo estimation on synthetic material.

use crate::helpers::*;
use mixloom::analysis::{analyze, estimate_tempo};

#[test]
fn test_click_train_tempo() {
    let samples = generate_click_train(0.5, TEST_SAMPLE_RATE, 6.0);
    let analysis = analyze(&samples, TEST_SAMPLE_RATE);

    assert!(analysis.onsets.len() >= 10, "got {} onsets", analysis.onsets.len());
    let tempo = analysis.tempo.expect("click train should yield a tempo");
    assert!(
        (tempo - 120.0).abs() <= tolerances::TEMPO_TOLERANCE_BPM,
        "estimated {tempo} BPM"
    );
}

#[test]
fn test_onsets_are_ordered() {
    let samples = generate_click_train(0.3, TEST_SAMPLE_RATE, 3.0);
    let positions = analyze(&samples, TEST_SAMPLE_RATE).positions();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(positions.iter().all(|&p| p < samples.len()));
}

#[test]
fn test_silence_has_no_tempo() {
    let analysis = analyze(&vec![0.0; 44100], TEST_SAMPLE_RATE);
    assert!(analysis.onsets.is_empty());
    assert_eq!(analysis.tempo, None);
}

#[test]
fn test_tempo_is_octave_corrected() {
    // 0.25s spacing is 240 BPM, folded into range
    let onsets: Vec<usize> = (0..16).map(|i| i * 11025).collect();
    let tempo = estimate_tempo(&onsets, TEST_SAMPLE_RATE).unwrap();
    assert!((tempo - 120.0).abs() < 1e-6);
}

#[test]
fn test_loaded_source_is_analyzed() {
    let engine = test_engine();
    let samples = generate_click_train(0.5, TEST_SAMPLE_RATE, 4.0);
    let source = engine.load_source(
        mono_source(samples, TEST_SAMPLE_RATE),
        mixloom::SourceId(0),
    );
    assert!(!source.onsets().is_empty());
    assert!(engine.granular().source_tempo().is_some());
}
