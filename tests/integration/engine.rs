//! Engine construction, configuration and backend switching.

use crate::helpers::*;
use approx::assert_relative_eq;
use mixloom::phrase::PhraseNode;
use mixloom::prelude::*;
use mixloom::Error;

fn engine_with_material() -> SynthesisEngine {
    let engine = SynthesisEngine::builder()
        .sample_rate(TEST_SAMPLE_RATE)
        .phrase(PlayerParameters {
            auto_advance: false,
            ..Default::default()
        })
        .hybrid_mix(0.5)
        .build()
        .unwrap();

    engine.load_source(
        mono_source(generate_noise(44100, 5), TEST_SAMPLE_RATE),
        SourceId(0),
    );
    engine.load_graph(
        PhraseGraph::new(vec![PhraseNode::new("a1", "a.wav", 0.0, 2.0)]).unwrap(),
    );
    engine
        .load_song(
            "a.wav",
            mono_source(vec![0.25; 2 * TEST_SAMPLE_RATE as usize], TEST_SAMPLE_RATE),
        )
        .unwrap();
    engine
}

#[test]
fn test_builder_defaults() {
    let engine = test_engine();
    assert_eq!(engine.sample_rate(), TEST_SAMPLE_RATE);
    assert_eq!(engine.current_backend(), None);
    assert_relative_eq!(engine.hybrid_mix(), 0.5);
}

#[test]
fn test_builder_rejects_bad_sample_rate() {
    let result = SynthesisEngine::builder().sample_rate(100.0).build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_unavailable_backend_reports_requirement() {
    let engine = test_engine();
    let err = engine.set_backend(BackendKind::Concatenative).unwrap_err();
    assert!(err.to_string().starts_with("concatenative backend unavailable"));
    assert_eq!(engine.current_backend(), None);
}

#[test]
fn test_switching_backends() {
    let engine = engine_with_material();
    for kind in [BackendKind::Granular, BackendKind::Concatenative, BackendKind::Hybrid] {
        assert!(engine.is_available(kind), "{kind} should be available");
    }

    engine.set_backend(BackendKind::Granular).unwrap();
    assert_eq!(engine.current_backend(), Some(BackendKind::Granular));
    assert!(engine.granular().is_running());

    engine.set_backend(BackendKind::Concatenative).unwrap();
    assert_eq!(engine.current_backend(), Some(BackendKind::Concatenative));
    assert!(!engine.granular().is_running());
    assert!(engine.player().is_running());

    let (left, _) = render_blocks(TEST_BUFFER_SIZE * 4, |l, r| engine.render(l, r));
    assert!(left.iter().all(|&s| (s - 0.25).abs() < tolerances::FLOAT_EPSILON));

    engine.set_backend(BackendKind::Hybrid).unwrap();
    assert!(engine.granular().is_running());
    assert!(engine.player().is_running());

    engine.stop();
    assert_eq!(engine.current_backend(), None);
    assert!(!engine.granular().is_running());
    assert!(!engine.player().is_running());
    let (left, right) = render_blocks(TEST_BUFFER_SIZE, |l, r| engine.render(l, r));
    assert!(is_silent(&left) && is_silent(&right));
}

#[test]
fn test_hybrid_mix_extremes() {
    let engine = engine_with_material();
    engine.set_backend(BackendKind::Hybrid).unwrap();

    engine.set_hybrid_mix(1.0);
    let (left, _) = render_blocks(TEST_BUFFER_SIZE * 2, |l, r| engine.render(l, r));
    assert!(left.iter().all(|&s| (s - 0.25).abs() < tolerances::FLOAT_EPSILON));

    engine.set_hybrid_mix(7.0);
    assert_relative_eq!(engine.hybrid_mix(), 1.0);
}

#[test]
fn test_parameters_reach_granular() {
    let engine = engine_with_material();
    engine.set_parameters(SynthesisParameters {
        density: 1.0,
        texture: 0.0,
        pitch: 1.0,
        ..Default::default()
    });

    let granular = engine.granular().parameters();
    assert_relative_eq!(granular.grain_density, 50.0);
    assert_relative_eq!(granular.grain_size, 0.02);
    assert_relative_eq!(granular.pitch, 2.0);
    assert_relative_eq!(engine.parameters().density, 1.0);
    assert_eq!(
        engine.player().parameters().scoring.energy_target,
        Some(0.5)
    );
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mixloom.toml");
    std::fs::write(
        &path,
        r#"
sample_rate = 48000.0
hybrid_mix = 0.25

[granular]
grain_size = 0.08
window = "blackman"

[transition]
kind = "eqSwap"
duration_bars = 8.0
"#,
    )
    .unwrap();

    let engine = EngineBuilder::from_file(&path).unwrap().build().unwrap();
    assert_eq!(engine.sample_rate(), 48000.0);
    assert_relative_eq!(engine.hybrid_mix(), 0.25);
    assert_relative_eq!(engine.config().granular.grain_size, 0.08);

    let transition = engine.player().parameters().transition;
    assert_eq!(transition.kind, TransitionType::EqSwap);
    assert_relative_eq!(transition.duration_bars, 8.0);
}

#[test]
fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");

    std::fs::write(&path, "sample_rate = \"fast\"").unwrap();
    assert!(matches!(EngineConfig::load(&path), Err(Error::ConfigParse(_))));

    std::fs::write(&path, "hybrid_mix = 2.0").unwrap();
    assert!(matches!(EngineConfig::load(&path), Err(Error::InvalidConfig(_))));

    assert!(matches!(
        EngineConfig::load(dir.path().join("missing.toml")),
        Err(Error::Io(_))
    ));
}
