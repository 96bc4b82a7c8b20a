//! Compatibility scoring between the playing phrase and candidate successors.

use crate::graph::{PhraseGraph, PhraseNode};
use crate::key::MusicalKey;
use crate::transition::TransitionType;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Score used when a component can't be computed.
const NEUTRAL_SCORE: f64 = 0.5;

/// Relative weight of each component in the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityWeights {
    pub spectral: f64,
    pub transition: f64,
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
}

impl Default for CompatibilityWeights {
    fn default() -> Self {
        Self {
            spectral: 0.3,
            transition: 0.3,
            tempo: 0.15,
            key: 0.15,
            energy: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    pub weights: CompatibilityWeights,
    pub prefer_same_key: bool,
    /// Score energy against this target instead of the current phrase
    pub energy_target: Option<f64>,
    /// Width of the uniform tie-break noise added before ranking
    pub jitter: f64,
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            weights: CompatibilityWeights::default(),
            prefer_same_key: false,
            energy_target: None,
            jitter: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub index: usize,
    pub id: String,
    pub total: f64,
    pub spectral: f64,
    pub transition: f64,
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
    /// From the link, when the graph has one
    pub suggested_transition: Option<TransitionType>,
}

/// Tiered tempo-ratio score.
///
/// Within 2% of 1.0 → 1.0; within 2% of 0.5 or 2.0 → 0.9; within 5% → 0.8;
/// within 10% → 0.6; otherwise `max(0, 1 - |ratio - 1|)`.
pub fn tempo_ratio_score(ratio: f64) -> f64 {
    if !ratio.is_finite() || ratio <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let off = (ratio - 1.0).abs();
    if off <= 0.02 {
        1.0
    } else if (ratio / 0.5 - 1.0).abs() <= 0.02 || (ratio / 2.0 - 1.0).abs() <= 0.02 {
        0.9
    } else if off <= 0.05 {
        0.8
    } else if off <= 0.10 {
        0.6
    } else {
        (1.0 - off).max(0.0)
    }
}

/// Harmonic compatibility; unknown keys score neutral.
pub fn key_score(from: Option<MusicalKey>, to: Option<MusicalKey>, prefer_same_key: bool) -> f64 {
    let (Some(a), Some(b)) = (from, to) else {
        return NEUTRAL_SCORE;
    };
    if a == b {
        1.0
    } else if a.relative() == b {
        0.95
    } else if a.is_fifth_neighbor(&b) {
        0.85
    } else if a.parallel() == b {
        0.8
    } else if prefer_same_key {
        0.2
    } else {
        0.5
    }
}

/// Cosine similarity clamped to `[0, 1]`. `None` for empty, mismatched or
/// zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let (dot, na, nb) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |(d, x, y), (&p, &q)| {
        let (p, q) = (p as f64, q as f64);
        (d + p * q, x + p * p, y + q * q)
    });
    if na <= 0.0 || nb <= 0.0 {
        return None;
    }
    Some((dot / (na.sqrt() * nb.sqrt())).clamp(0.0, 1.0))
}

pub fn energy_score(a: f64, b: f64) -> f64 {
    (1.0 - (a - b).abs()).clamp(0.0, 1.0)
}

/// Brightness similarity from spectral centroids, used when no embedding exists.
fn centroid_score(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let ratio = a.max(b) / a.min(b);
    if ratio < 1.2 {
        1.0
    } else if ratio < 1.5 {
        0.8
    } else if ratio < 2.0 {
        0.6
    } else {
        0.4
    }
}

/// Deterministic score of moving from `from` to `to`.
pub fn score_candidate(
    from: &PhraseNode,
    to: &PhraseNode,
    to_index: usize,
    options: &ScoringOptions,
) -> CandidateScore {
    let spectral = cosine_similarity(&from.embedding, &to.embedding)
        .unwrap_or_else(|| centroid_score(from.spectral_centroid, to.spectral_centroid));
    let transition =
        cosine_similarity(&from.tail_spectrum, &to.head_spectrum).unwrap_or(NEUTRAL_SCORE);
    let tempo = if from.tempo > 0.0 && to.tempo > 0.0 {
        tempo_ratio_score(to.tempo / from.tempo)
    } else {
        NEUTRAL_SCORE
    };
    let key = key_score(from.musical_key(), to.musical_key(), options.prefer_same_key);
    let energy = energy_score(options.energy_target.unwrap_or(from.energy), to.energy);

    let w = &options.weights;
    let total = w.spectral * spectral
        + w.transition * transition
        + w.tempo * tempo
        + w.key * key
        + w.energy * energy;

    CandidateScore {
        index: to_index,
        id: to.id.clone(),
        total,
        spectral,
        transition,
        tempo,
        key,
        energy,
        suggested_transition: from.link_to(&to.id).and_then(|l| l.suggested_transition),
    }
}

/// Score every candidate reachable from `from_index`, best first.
///
/// Candidates are the node's links, or every other node when it has none.
/// Uniform noise of `options.jitter` is added before sorting, so equal
/// scores come back in varying order.
pub fn rank_candidates<R: Rng>(
    graph: &PhraseGraph,
    from_index: usize,
    options: &ScoringOptions,
    rng: &mut R,
) -> Vec<CandidateScore> {
    let Some(from) = graph.node_at(from_index) else {
        return Vec::new();
    };

    let targets: Vec<usize> = if from.links.is_empty() {
        (0..graph.len()).filter(|&i| i != from_index).collect()
    } else {
        from.links
            .iter()
            .filter_map(|l| graph.index_of(&l.target_id))
            .filter(|&i| i != from_index)
            .collect()
    };

    let mut scored: Vec<CandidateScore> = targets
        .into_iter()
        .filter_map(|i| graph.node_at(i).map(|to| score_candidate(from, to, i, options)))
        .map(|mut s| {
            if options.jitter > 0.0 {
                s.total += rng.gen_range(0.0..options.jitter);
            }
            s
        })
        .collect();
    scored.sort_by(|a, b| b.total.total_cmp(&a.total));
    scored
}
