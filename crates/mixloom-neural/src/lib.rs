//! Bridge to an external neural synthesis server.
//!
//! The server is a separate process speaking a small socket protocol:
//! NUL-terminated JSON control messages and length-prefixed `f32` audio
//! frames. [`NeuralBridge`] owns the process, keeps a rolling buffer of
//! generated audio topped up in the background, and reconnects with
//! backoff when the server goes away.
//!
//! ```ignore
//! use mixloom_neural::{BridgeConfig, NeuralBridge};
//!
//! let bridge = NeuralBridge::new(BridgeConfig {
//!     script: "scripts/rave_server.py".into(),
//!     model: "models/house.ts".into(),
//!     ..Default::default()
//! });
//! bridge.start().await?;
//!
//! // Audio thread
//! bridge.read_samples(&mut block);
//! ```

pub mod error;
pub use error::{BridgeError, Result};

mod bridge;
pub use bridge::{BridgeStatus, NeuralBridge};

mod config;
pub use config::{BridgeConfig, DEFAULT_SOCKET_PATH, NEURAL_SAMPLE_RATE};

mod policy;
pub use policy::ReconnectPolicy;

pub mod protocol;
pub use protocol::NeuralControls;

mod queue;
pub use queue::SampleQueue;

mod transport;
pub use transport::MessageTransport;
