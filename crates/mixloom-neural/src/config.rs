use crate::policy::ReconnectPolicy;
use crate::protocol::DEFAULT_FRAMES;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Socket the server listens on unless configured otherwise.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/rave_server.sock";

/// Sample rate of the audio the server produces.
pub const NEURAL_SAMPLE_RATE: f64 = 48_000.0;

/// Neural server process and fill-loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Interpreter used to run `script`; `PATH` is searched for `python3`, then `python`
    pub interpreter: Option<PathBuf>,
    pub script: PathBuf,
    pub model: PathBuf,
    pub anchors: Option<PathBuf>,
    pub socket_path: PathBuf,
    pub startup_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub frames_per_request: u32,
    /// Fill loop requests more audio below this many buffered samples
    pub low_water_samples: usize,
    /// Consumed samples are trimmed once storage passes this
    pub max_buffered_samples: usize,
    /// Consecutive fill failures before reconnecting
    pub max_consecutive_failures: u32,
    pub fill_interval_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            script: PathBuf::from("scripts/rave_server.py"),
            model: PathBuf::new(),
            anchors: None,
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            startup_timeout_ms: 5000,
            poll_interval_ms: 100,
            request_timeout_ms: 5000,
            frames_per_request: DEFAULT_FRAMES,
            low_water_samples: 24_000,
            max_buffered_samples: 192_000,
            max_consecutive_failures: 3,
            fill_interval_ms: 10,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl BridgeConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fill_interval(&self) -> Duration {
        Duration::from_millis(self.fill_interval_ms.max(1))
    }

    /// Server arguments after the script path.
    pub fn server_args(&self) -> Vec<std::ffi::OsString> {
        let mut args = vec![
            "--model".into(),
            self.model.clone().into_os_string(),
            "--server".into(),
            "--socket".into(),
            self.socket_path.clone().into_os_string(),
        ];
        if let Some(anchors) = &self.anchors {
            args.push("--anchors".into());
            args.push(anchors.clone().into_os_string());
        }
        args
    }
}
