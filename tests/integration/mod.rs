//! Integration test modules for mixloom
//!
//! - engine: builder, config files, backend switching
//! - granular: grain scheduling through the engine
//! - phrase: transitions and phrase-graph playback
//! - analysis: onset and tempo detection
//! - neural: bridge lifecycle against a stand-in server

pub mod analysis;
pub mod engine;
pub mod granular;
#[cfg(feature = "neural")]
pub mod neural;
pub mod phrase;
