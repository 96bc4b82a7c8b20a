//! Granular synthesizer driven through the engine.

use crate::helpers::*;
use mixloom::prelude::*;

#[test]
fn test_one_second_source_stays_under_grain_cap() {
    let engine = test_engine();
    let source = mono_source(
        generate_sine(440.0, TEST_SAMPLE_RATE, TEST_SAMPLE_RATE as usize),
        TEST_SAMPLE_RATE,
    );
    engine.load_source(source, SourceId(0));

    let synth = engine.granular();
    synth.set_parameters(GranularParameters {
        grain_size: 0.1,
        grain_density: 15.0,
        seed: Some(7),
        ..Default::default()
    });
    synth.start().unwrap();

    let mut left = vec![0.0; 4096];
    let mut right = vec![0.0; 4096];
    let mut all = Vec::new();
    for _ in 0..40 {
        synth.render(&mut left, &mut right);
        assert!(synth.active_grain_count() <= 64);
        for grain in synth.inspect_grains() {
            assert!(grain.cursor <= grain.length);
        }
        all.extend_from_slice(&left);
    }

    assert!(rms(&all) > 0.0, "granular output should be audible");
    assert!(peak(&all) <= 1.0 + tolerances::FLOAT_EPSILON);
}

#[test]
fn test_stopped_synth_is_silent() {
    let engine = test_engine();
    engine.load_source(
        mono_source(generate_noise(22050, 3), TEST_SAMPLE_RATE),
        SourceId(1),
    );

    let (left, right) = render_blocks(4096, |l, r| engine.granular().render(l, r));
    assert!(is_silent(&left));
    assert!(is_silent(&right));
    assert_eq!(engine.granular().active_grain_count(), 0);
}

#[test]
fn test_start_without_source_fails() {
    let engine = test_engine();
    let err = engine.granular().start().unwrap_err();
    assert_eq!(err.to_string(), "No source loaded");
}

#[test]
fn test_grain_cap_is_respected_at_high_density() {
    let engine = test_engine();
    engine.load_source(
        mono_source(generate_noise(44100, 11), TEST_SAMPLE_RATE),
        SourceId(0),
    );
    let synth = engine.granular();
    synth.set_parameters(GranularParameters {
        grain_size: 0.5,
        grain_density: 200.0,
        max_grains: 16,
        seed: Some(1),
        ..Default::default()
    });
    synth.start().unwrap();

    let mut left = vec![0.0; 1024];
    let mut right = vec![0.0; 1024];
    for _ in 0..30 {
        synth.render(&mut left, &mut right);
        assert!(synth.active_grain_count() <= 16);
    }
    assert!(synth.active_grain_count() > 0);
}

#[test]
fn test_noise_source_is_reproducible() {
    let a = generate_noise(4096, 42);
    assert_eq!(a, generate_noise(4096, 42));
    assert_ne!(a, generate_noise(4096, 43));
    assert!(a.iter().all(|s| (-1.0..1.0).contains(s)));
    assert!(rms(&a) > 0.3);
}
