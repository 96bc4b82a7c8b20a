//! Phrase-graph playback.
//!
//! A [`PhraseGraph`] describes segments of whole songs and scored links
//! between them. [`PhraseGraphPlayer`] plays songs sample-by-sample, swaps
//! gaplessly between consecutive phrases and branches to other songs on a
//! beat, using a [`TransitionEngine`] for the blend.

mod error;
mod graph;
mod key;
mod player;
mod scoring;
mod transition;

pub use error::{Error, Result};
pub use graph::{suggest_transition, PhraseEdge, PhraseGraph, PhraseLink, PhraseNode};
pub use key::MusicalKey;
pub use player::{
    is_near_beat, PhraseGraphPlayer, PlayerParameters, BEAT_TOLERANCE_SECS,
    PHRASE_END_TOLERANCE_SECS,
};
pub use scoring::{
    cosine_similarity, energy_score, key_score, rank_candidates, score_candidate,
    tempo_ratio_score, CandidateScore, CompatibilityWeights, ScoringOptions,
};
pub use transition::{
    BandGains, TransitionConfig, TransitionEngine, TransitionState, TransitionType,
};
