//! Neural server lifecycle and the background fill loop.
//!
//! `start()` reuses a server already listening on the socket, otherwise it
//! spawns one and polls until the socket accepts connections. A fill task then
//! keeps the [`SampleQueue`] above its low-water mark; the render path only
//! ever copies out of that queue.

use crate::config::{BridgeConfig, NEURAL_SAMPLE_RATE};
use crate::error::{BridgeError, Result};
use crate::protocol::NeuralControls;
use crate::queue::SampleQueue;
use crate::transport::MessageTransport;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Server output lines kept for diagnostics.
const DIAGNOSTIC_LINES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BridgeStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Error(String),
}

impl std::fmt::Display for BridgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeStatus::Stopped => write!(f, "stopped"),
            BridgeStatus::Starting => write!(f, "starting"),
            BridgeStatus::Running => write!(f, "running"),
            BridgeStatus::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}

struct BridgeShared {
    config: BridgeConfig,
    status: ArcSwap<BridgeStatus>,
    styles: ArcSwap<Vec<String>>,
    controls: ArcSwap<NeuralControls>,
    queue: Mutex<SampleQueue>,
    transport: tokio::sync::Mutex<Option<MessageTransport>>,
    child: Mutex<Option<Child>>,
    diagnostics: Arc<Mutex<VecDeque<String>>>,
    running: AtomicBool,
    /// Wakes the fill loop out of its sleeps on stop
    shutdown: Notify,
}

impl BridgeShared {
    fn set_status(&self, status: BridgeStatus) {
        self.status.store(Arc::new(status));
    }

    fn buffered(&self) -> usize {
        self.queue.lock().available()
    }

    /// Sleep for `duration`, returning early on shutdown.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.notified() => {}
        }
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.request_timeout(), fut)
            .await
            .map_err(|_| BridgeError::Timeout {
                operation: operation.to_string(),
                duration_ms: self.config.request_timeout_ms,
            })?
    }

    /// Connect, query styles and install the transport.
    async fn establish(&self) -> Result<()> {
        let mut transport = self.connect_or_spawn().await?;
        let styles = self
            .with_timeout("get_styles", transport.get_styles())
            .await?;
        tracing::info!("Neural server styles: {}", styles.join(", "));
        self.styles.store(Arc::new(styles));
        *self.transport.lock().await = Some(transport);
        Ok(())
    }

    async fn connect_or_spawn(&self) -> Result<MessageTransport> {
        let config = &self.config;
        if let Ok(transport) = MessageTransport::connect(&config.socket_path).await {
            tracing::info!(
                "Connected to running neural server at {}",
                config.socket_path.display()
            );
            return Ok(transport);
        }

        if !config.script.is_file() {
            return Err(BridgeError::ScriptNotFound(config.script.clone()));
        }
        let interpreter = resolve_interpreter(config.interpreter.as_deref())?;

        self.kill_child();
        self.diagnostics.lock().clear();
        let mut child = Command::new(&interpreter)
            .arg(&config.script)
            .args(config.server_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::StartupFailed(format!("{}: {e}", interpreter.display())))?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(capture_output(stdout, Arc::clone(&self.diagnostics)));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(capture_output(stderr, Arc::clone(&self.diagnostics)));
        }
        tracing::info!(
            "Spawned neural server: {} {}",
            interpreter.display(),
            config.script.display()
        );
        *self.child.lock() = Some(child);

        let started = Instant::now();
        loop {
            tokio::time::sleep(config.poll_interval()).await;

            if let Some(status) = self.child_exit_status() {
                return Err(BridgeError::StartupFailed(format!(
                    "server exited with {status}{}",
                    self.diagnostic_tail()
                )));
            }
            if config.socket_path.exists() {
                if let Ok(transport) = MessageTransport::connect(&config.socket_path).await {
                    tracing::info!(
                        "Neural server ready after {}ms",
                        started.elapsed().as_millis()
                    );
                    return Ok(transport);
                }
            }
            if started.elapsed() >= config.startup_timeout() {
                self.kill_child();
                return Err(BridgeError::Timeout {
                    operation: "neural server startup".to_string(),
                    duration_ms: config.startup_timeout_ms,
                });
            }
        }
    }

    /// Drop the connection and establish a new one, respawning if needed.
    async fn reconnect(&self) -> Result<()> {
        *self.transport.lock().await = None;
        let transport = self.connect_or_spawn().await?;
        *self.transport.lock().await = Some(transport);
        Ok(())
    }

    async fn request_audio(&self, controls: &NeuralControls, frames: u32) -> Result<Vec<f32>> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(BridgeError::NotRunning)?;
        let result = self
            .with_timeout("generate", transport.generate(controls, frames))
            .await;
        if let Err(e) = &result {
            // Anything but a remote error leaves the stream mid-frame
            if !matches!(e, BridgeError::Remote(_)) {
                *guard = None;
            }
        }
        result
    }

    async fn send_controls(&self, controls: &NeuralControls) -> Result<()> {
        let mut guard = self.transport.lock().await;
        let transport = guard.as_mut().ok_or(BridgeError::NotRunning)?;
        let result = self
            .with_timeout("set_controls", transport.set_controls(controls))
            .await;
        if let Err(e) = &result {
            if !matches!(e, BridgeError::Remote(_)) {
                *guard = None;
            }
        }
        result
    }

    fn child_exit_status(&self) -> Option<ExitStatus> {
        let mut guard = self.child.lock();
        match guard.as_mut().map(Child::try_wait) {
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                tracing::warn!("Failed to poll neural server process: {e}");
                None
            }
            None => None,
        }
    }

    fn kill_child(&self) {
        if let Some(mut child) = self.child.lock().take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("Neural server already gone: {e}");
            }
        }
    }

    fn diagnostic_tail(&self) -> String {
        let lines = self.diagnostics.lock();
        if lines.is_empty() {
            String::new()
        } else {
            format!("\n{}", lines.iter().cloned().collect::<Vec<_>>().join("\n"))
        }
    }
}

async fn capture_output<R: AsyncRead + Unpin>(reader: R, sink: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "mixloom_neural::server", "{line}");
        let mut sink = sink.lock();
        if sink.len() == DIAGNOSTIC_LINES {
            sink.pop_front();
        }
        sink.push_back(line);
    }
}

fn find_in_path(name: &OsStr) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn resolve_interpreter(explicit: Option<&Path>) -> Result<PathBuf> {
    let names: Vec<&OsStr> = match explicit {
        Some(path) if path.components().count() > 1 => {
            return if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(BridgeError::InterpreterNotFound(path.display().to_string()))
            };
        }
        Some(name) => vec![name.as_os_str()],
        None => vec![OsStr::new("python3"), OsStr::new("python")],
    };
    names
        .iter()
        .find_map(|name| find_in_path(name))
        .ok_or_else(|| {
            BridgeError::InterpreterNotFound(
                names
                    .iter()
                    .map(|n| n.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })
}

async fn fill_loop(shared: Arc<BridgeShared>) {
    let config = &shared.config;
    let mut failures = 0u32;
    let mut attempt = 0u32;
    // First error of the current failure streak
    let mut cause: Option<String> = None;

    while shared.running.load(Ordering::Acquire) {
        if shared.buffered() >= config.low_water_samples {
            shared.pause(config.fill_interval()).await;
            continue;
        }

        let controls = shared.controls.load_full();
        let error = match shared
            .request_audio(&controls, config.frames_per_request)
            .await
        {
            Ok(samples) => {
                {
                    // stop() clears the queue after dropping the flag
                    let mut queue = shared.queue.lock();
                    if !shared.running.load(Ordering::Acquire) {
                        break;
                    }
                    queue.push(&samples);
                }
                failures = 0;
                attempt = 0;
                cause = None;
                if **shared.status.load() != BridgeStatus::Running {
                    tracing::info!("Neural bridge recovered");
                    shared.set_status(BridgeStatus::Running);
                }
                continue;
            }
            // The previous failure dropped the connection: retry on a fresh one
            Err(BridgeError::NotRunning) => {
                if !shared.running.load(Ordering::Acquire) {
                    break;
                }
                match shared.reconnect().await {
                    Ok(()) => continue,
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        failures += 1;
        let reason = cause.get_or_insert_with(|| error.to_string()).clone();
        tracing::warn!(
            "Neural fill failed ({failures}/{}): {error}",
            config.max_consecutive_failures
        );
        if failures < config.max_consecutive_failures {
            shared.pause(config.fill_interval()).await;
            continue;
        }
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        let reason = match shared.child_exit_status() {
            Some(status) => BridgeError::ProcessCrashed(format!(
                "exited with {status}{}",
                shared.diagnostic_tail()
            ))
            .to_string(),
            None => reason,
        };
        shared.set_status(BridgeStatus::Error(reason));

        if !config.reconnect.should_retry(attempt) {
            tracing::error!("Neural bridge giving up after {attempt} reconnect attempts");
            break;
        }
        let delay = config.reconnect.delay_for(attempt);
        attempt += 1;
        tracing::info!("Reconnecting to neural server in {}ms", delay.as_millis());
        shared.pause(delay).await;
        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        match shared.reconnect().await {
            Ok(()) => {
                failures = 0;
                cause = None;
                tracing::info!("Reconnected to neural server");
            }
            Err(e) => {
                tracing::warn!("Reconnect failed: {e}");
                shared.set_status(BridgeStatus::Error(e.to_string()));
            }
        }
    }

    *shared.transport.lock().await = None;
    if !shared.running.load(Ordering::Acquire) {
        // A reconnect may have respawned the server after stop()
        shared.kill_child();
    }
    tracing::debug!("Neural fill loop exited");
}

/// Owns the external synthesis process and the generated-sample buffer.
pub struct NeuralBridge {
    shared: Arc<BridgeShared>,
    fill_task: Mutex<Option<JoinHandle<()>>>,
}

impl NeuralBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let queue = SampleQueue::new(config.max_buffered_samples);
        Self {
            shared: Arc::new(BridgeShared {
                config,
                status: ArcSwap::from_pointee(BridgeStatus::Stopped),
                styles: ArcSwap::from_pointee(Vec::new()),
                controls: ArcSwap::from_pointee(NeuralControls::default()),
                queue: Mutex::new(queue),
                transport: tokio::sync::Mutex::new(None),
                child: Mutex::new(None),
                diagnostics: Arc::new(Mutex::new(VecDeque::new())),
                running: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
            fill_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Connect to (or spawn) the server, fetch styles and start filling.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(&self) -> Result<()> {
        if self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }
        // Let a loop left over from a previous run finish its cleanup
        let previous = self.fill_task.lock().take();
        if let Some(task) = previous {
            if let Err(e) = task.await {
                tracing::warn!("Previous neural fill loop failed: {e}");
            }
        }
        self.shared.set_status(BridgeStatus::Starting);

        if let Err(e) = self.shared.establish().await {
            tracing::warn!("Neural bridge failed to start: {e}");
            self.shared.kill_child();
            self.shared.set_status(BridgeStatus::Error(e.to_string()));
            return Err(e);
        }

        self.shared.queue.lock().clear();
        self.shared.running.store(true, Ordering::Release);
        self.shared.set_status(BridgeStatus::Running);
        let task = tokio::spawn(fill_loop(Arc::clone(&self.shared)));
        *self.fill_task.lock() = Some(task);
        tracing::info!("Neural bridge running");
        Ok(())
    }

    /// Stop filling, close the connection and kill the server. Idempotent.
    ///
    /// The fill loop exits at its next check of the running flag and drops
    /// the connection it holds.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::AcqRel);
        self.shared.shutdown.notify_waiters();
        if let Ok(mut transport) = self.shared.transport.try_lock() {
            *transport = None;
        }
        self.shared.kill_child();
        self.shared.queue.lock().clear();
        self.shared.set_status(BridgeStatus::Stopped);
        if was_running {
            tracing::info!("Neural bridge stopped");
        }
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus::clone(&self.shared.status.load())
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
            && **self.shared.status.load() == BridgeStatus::Running
    }

    /// Style names reported by the server at startup.
    pub fn styles(&self) -> Vec<String> {
        Vec::clone(&self.shared.styles.load())
    }

    /// Recent server stdout/stderr lines.
    pub fn diagnostics(&self) -> Vec<String> {
        self.shared.diagnostics.lock().iter().cloned().collect()
    }

    /// Controls used by the fill loop for subsequent requests.
    pub fn update_controls(&self, controls: &NeuralControls) {
        self.shared.controls.store(Arc::new(controls.sanitized()));
    }

    pub fn controls(&self) -> NeuralControls {
        NeuralControls::clone(&self.shared.controls.load())
    }

    /// Push controls to the server without generating audio.
    pub async fn set_controls(&self, controls: &NeuralControls) -> Result<()> {
        self.update_controls(controls);
        let controls = self.shared.controls.load_full();
        self.shared.send_controls(&controls).await
    }

    /// Generate `frames` latent frames of audio directly.
    pub async fn generate(&self, controls: &NeuralControls, frames: u32) -> Result<Vec<f32>> {
        self.shared
            .request_audio(&controls.sanitized(), frames)
            .await
    }

    pub fn buffered_samples(&self) -> usize {
        self.shared.buffered()
    }

    /// Copy generated samples into `out`, zero-padding when starved.
    pub fn read_samples(&self, out: &mut [f32]) -> usize {
        self.shared.queue.lock().read_into(out)
    }

    pub fn sample_rate(&self) -> f64 {
        NEURAL_SAMPLE_RATE
    }
}

impl Drop for NeuralBridge {
    fn drop(&mut self) {
        self.stop();
    }
}
