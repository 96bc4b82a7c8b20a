//! Granular synthesis over one or more shared [`SourceBuffer`]s.
//!
//! ## Threading
//!
//! Control code publishes sources and parameters as immutable snapshots
//! (`ArcSwap`); the render callback loads the latest snapshot once per block.
//! Grain state lives in a fixed-capacity arena only the render path mutates.
//!
//! ```ignore
//! use mixloom_granular::{GranularParameters, GranularSynthesizer};
//!
//! let synth = GranularSynthesizer::new(44100.0);
//! synth.load_source(buffer, SourceId(0));
//! synth.set_parameters(GranularParameters { grain_density: 15.0, ..Default::default() });
//! synth.start()?;
//! synth.render(&mut left, &mut right);
//! ```
//!
//! [`SourceBuffer`]: mixloom_core::SourceBuffer

mod evolution;
mod grain;
mod params;
mod synth;

pub use evolution::{EvolutionMode, ScanPosition, EVOLUTION_SCALE};
pub use grain::{GrainInfo, MAX_GRAINS};
pub use params::GranularParameters;
pub use synth::GranularSynthesizer;
