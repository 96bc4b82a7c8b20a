//! Core types shared by every mixloom backend.
//!
//! - [`SourceBuffer`] - immutable decoded audio plus precomputed onsets/tempo
//! - [`SourceId`] - handle used to register and retire sources
//! - [`Error`] / [`Result`] - resource and empty-state errors

mod error;
mod source;

pub use error::{Error, Result};
pub use source::{SourceBuffer, SourceId};

/// One stereo output frame.
pub type StereoFrame = (f32, f32);
