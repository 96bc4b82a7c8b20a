//! Neural bridge lifecycle against a stand-in server on a Unix socket.

use crate::helpers::*;
use mixloom::neural::protocol::encode_audio_frame;
use mixloom::neural::BridgeStatus;
use mixloom::prelude::*;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Replies like the model server: JSON + NUL for control, framed f32 for audio.
async fn serve(stream: UnixStream) {
    let mut reader = BufReader::new(stream);
    loop {
        let mut request = Vec::new();
        match reader.read_until(0, &mut request).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        request.pop();
        let Ok(json) = serde_json::from_slice::<serde_json::Value>(&request) else {
            return;
        };
        let reply = match json["command"].as_str() {
            Some("get_styles") => with_terminator(br#"{"styles": ["ambient"]}"#),
            Some("set_controls") => with_terminator(br#"{"status": "ok"}"#),
            Some("generate") => {
                let frames = json["frames"].as_u64().unwrap_or(50) as usize;
                let energy = json["energy"].as_f64().unwrap_or(0.5) as f32;
                encode_audio_frame(&vec![energy * 0.5; frames * 8])
            }
            _ => with_terminator(br#"{"error": "Unknown command"}"#),
        };
        if reader.get_mut().write_all(&reply).await.is_err() {
            return;
        }
    }
}

fn with_terminator(body: &[u8]) -> Vec<u8> {
    let mut reply = body.to_vec();
    reply.push(0);
    reply
}

fn stand_in_server(socket: &Path) -> tokio::task::JoinHandle<()> {
    let listener = UnixListener::bind(socket).unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    })
}

fn bridge_config(dir: &Path) -> BridgeConfig {
    BridgeConfig {
        script: dir.join("rave_server.py"),
        socket_path: dir.join("rave.sock"),
        low_water_samples: 2000,
        max_buffered_samples: 8000,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_missing_script_reports_error_status() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = SynthesisEngine::builder()
        .neural(bridge_config(dir.path()))
        .build()
        .unwrap();

    let err = engine.start_neural().await.unwrap_err();
    assert!(err.to_string().contains("script not found"), "{err}");
    assert!(matches!(engine.neural().status(), BridgeStatus::Error(_)));
    assert!(!engine.is_available(BackendKind::Neural));
    assert!(engine.set_backend(BackendKind::Neural).is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_neural_backend_renders_server_audio() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = bridge_config(dir.path());
    let server = stand_in_server(&config.socket_path);

    let engine = SynthesisEngine::builder()
        .sample_rate(48000.0)
        .neural(config)
        .build()
        .unwrap();
    engine.set_parameters(SynthesisParameters {
        energy: 0.8,
        ..Default::default()
    });

    engine.start_neural().await.unwrap();
    assert_eq!(engine.neural().status(), BridgeStatus::Running);
    assert_eq!(engine.neural().styles(), vec!["ambient"]);
    engine.sync_neural_controls().await.unwrap();

    engine.set_backend(BackendKind::Neural).unwrap();
    let mut filled = false;
    for _ in 0..200 {
        if engine.neural().buffered_samples() >= 1024 {
            filled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(filled, "bridge never buffered audio");

    let mut left = vec![0.0; 1024];
    let mut right = vec![0.0; 1024];
    engine.render(&mut left, &mut right);
    assert!(left.iter().all(|&s| (s - 0.4).abs() < tolerances::FLOAT_EPSILON));
    assert_eq!(left, right);

    engine.stop_neural();
    assert_eq!(engine.current_backend(), None);
    assert_eq!(engine.neural().status(), BridgeStatus::Stopped);
    engine.render(&mut left, &mut right);
    assert!(is_silent(&left));
    server.abort();
}
