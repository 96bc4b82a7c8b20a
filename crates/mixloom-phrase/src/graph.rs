//! Persisted phrase graph: song segments plus scored links between them.
//!
//! The file is JSON with camelCase keys, as written by the analysis tools:
//!
//! ```json
//! {
//!   "version": "1.1",
//!   "nodes": [{
//!     "id": "a1", "audioFile": "/music/a.wav", "sourceTrack": "a",
//!     "tempo": 124.0, "key": "Am", "energy": 0.6,
//!     "startTime": 0.0, "endTime": 15.5,
//!     "beats": [0.0, 0.48], "downbeats": [0.0],
//!     "links": [{ "targetId": "b3", "weight": 0.82, "suggestedTransition": "eqSwap" }]
//!   }],
//!   "edges": []
//! }
//! ```

use crate::error::{Error, Result};
use crate::key::MusicalKey;
use crate::transition::TransitionType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;

/// Gap tolerated between one phrase's end and the next one's start, in seconds.
const SEQUENCE_TOLERANCE_SECS: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseLink {
    pub target_id: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub is_original_sequence: bool,
    #[serde(default)]
    pub suggested_transition: Option<TransitionType>,
    #[serde(default)]
    pub tempo_score: f64,
    #[serde(default)]
    pub key_score: f64,
    #[serde(default)]
    pub energy_score: f64,
    #[serde(default)]
    pub spectral_score: f64,
}

impl PhraseLink {
    pub fn new(target_id: impl Into<String>, weight: f64) -> Self {
        Self {
            target_id: target_id.into(),
            weight,
            is_original_sequence: false,
            suggested_transition: None,
            tempo_score: 0.0,
            key_score: 0.0,
            energy_score: 0.0,
            spectral_score: 0.0,
        }
    }
}

/// Flat edge list entry, merged into node links on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhraseEdge {
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub suggested_transition: Option<TransitionType>,
    #[serde(default)]
    pub is_original_sequence: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhraseNode {
    pub id: String,
    pub source_track: String,
    pub source_track_name: String,
    pub track_index: usize,
    /// Song the phrase is cut from; the key for decoded audio
    pub audio_file: String,
    pub tempo: f64,
    pub key: Option<String>,
    /// 0..1
    pub energy: f64,
    pub spectral_centroid: f64,
    pub segment_type: String,
    pub style: Option<String>,
    pub duration: f64,
    /// Seconds into the song
    pub start_time: f64,
    pub end_time: f64,
    /// Seconds relative to `start_time`
    pub beats: Vec<f64>,
    pub downbeats: Vec<f64>,
    /// Whole-segment spectral embedding
    pub embedding: Vec<f32>,
    /// Spectrum of the first bar
    pub head_spectrum: Vec<f32>,
    /// Spectrum of the last bar
    pub tail_spectrum: Vec<f32>,
    pub links: Vec<PhraseLink>,
}

impl PhraseNode {
    pub fn new(id: impl Into<String>, audio_file: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        let audio_file = audio_file.into();
        Self {
            id: id.into(),
            source_track: audio_file.clone(),
            audio_file,
            start_time,
            end_time,
            duration: end_time - start_time,
            tempo: 120.0,
            energy: 0.5,
            ..Default::default()
        }
    }

    pub fn musical_key(&self) -> Option<MusicalKey> {
        self.key.as_deref().and_then(MusicalKey::parse)
    }

    pub fn length_secs(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }

    pub fn link_to(&self, target_id: &str) -> Option<&PhraseLink> {
        self.links.iter().find(|l| l.target_id == target_id)
    }
}

/// Transition suggested for a link of `weight` between phrases whose
/// energies differ by `energy_delta`.
pub fn suggest_transition(weight: f64, energy_delta: f64) -> TransitionType {
    if weight > 0.8 {
        TransitionType::Crossfade
    } else if weight > 0.6 {
        TransitionType::EqSwap
    } else if weight > 0.4 && energy_delta.abs() > 0.3 {
        TransitionType::Filter
    } else {
        TransitionType::Cut
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhraseGraph {
    pub version: String,
    pub created_at: Option<String>,
    pub collection_path: Option<String>,
    pub nodes: Vec<PhraseNode>,
    pub edges: Vec<PhraseEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PhraseGraph {
    /// Build from nodes, indexing them by id.
    pub fn new(nodes: Vec<PhraseNode>) -> Result<Self> {
        let mut graph = Self {
            version: "1.1".to_string(),
            nodes,
            ..Default::default()
        };
        graph.finalize()?;
        Ok(graph)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut graph: Self = serde_json::from_str(json)?;
        graph.finalize()?;
        Ok(graph)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut graph: Self = serde_json::from_reader(reader)?;
        graph.finalize()?;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Index nodes, merge the edge list into links, drop dangling links.
    fn finalize(&mut self) -> Result<()> {
        self.index.clear();
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if self.index.insert(node.id.clone(), i).is_some() {
                return Err(Error::InvalidGraph(format!("duplicate phrase id {}", node.id)));
            }
            if node.end_time < node.start_time {
                return Err(Error::InvalidGraph(format!(
                    "phrase {} ends before it starts",
                    node.id
                )));
            }
            node.beats.sort_by(|a, b| a.total_cmp(b));
            node.downbeats.sort_by(|a, b| a.total_cmp(b));
        }

        for edge in &self.edges {
            let Some(&src) = self.index.get(&edge.source_id) else {
                continue;
            };
            let node = &mut self.nodes[src];
            if node.link_to(&edge.target_id).is_none() {
                node.links.push(PhraseLink {
                    suggested_transition: edge.suggested_transition,
                    is_original_sequence: edge.is_original_sequence,
                    ..PhraseLink::new(edge.target_id.clone(), edge.weight)
                });
            }
        }

        let index = &self.index;
        let mut dropped = 0;
        for node in &mut self.nodes {
            let before = node.links.len();
            node.links.retain(|l| index.contains_key(&l.target_id));
            dropped += before - node.links.len();
        }
        if dropped > 0 {
            tracing::debug!("Dropped {dropped} links to unknown phrases");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&PhraseNode> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn node_at(&self, index: usize) -> Option<&PhraseNode> {
        self.nodes.get(index)
    }

    /// `to` starts where `from` ends in the same song.
    pub fn is_sequential(&self, from: usize, to: usize) -> bool {
        match (self.nodes.get(from), self.nodes.get(to)) {
            (Some(a), Some(b)) => {
                a.audio_file == b.audio_file
                    && (b.start_time - a.end_time).abs() <= SEQUENCE_TOLERANCE_SECS
            }
            _ => false,
        }
    }

    /// The phrase that follows `index` in its original song, if any.
    pub fn successor(&self, index: usize) -> Option<usize> {
        let node = self.nodes.get(index)?;
        let by_link = node
            .links
            .iter()
            .filter(|l| l.is_original_sequence)
            .filter_map(|l| self.index_of(&l.target_id))
            .find(|&t| t != index);
        by_link.or_else(|| {
            (0..self.nodes.len()).find(|&i| i != index && self.is_sequential(index, i))
        })
    }

    /// Distinct audio files referenced by the graph.
    pub fn songs(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.audio_file.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH_JSON: &str = r#"{
        "version": "1.1",
        "createdAt": "2024-05-01T12:00:00+00:00",
        "collectionPath": "/music",
        "nodes": [
            {
                "id": "a1", "sourceTrack": "/music/a.wav", "sourceTrackName": "a.wav",
                "trackIndex": 0, "audioFile": "/music/a.wav", "tempo": 124.0, "key": "Am",
                "energy": 0.6, "spectralCentroid": 1800.0, "segmentType": "phrase",
                "duration": 8.0, "startTime": 0.0, "endTime": 8.0,
                "beats": [0.48, 0.0, 0.97], "downbeats": [0.0],
                "waveform": {"low": [0.1], "mid": [0.2], "high": [0.3], "points": 1},
                "links": [
                    {"targetId": "a2", "weight": 0.9, "isOriginalSequence": true,
                     "suggestedTransition": "crossfade", "tempoScore": 1.0,
                     "keyScore": 1.0, "energyScore": 0.85, "spectralScore": 1.0},
                    {"targetId": "ghost", "weight": 0.5, "isOriginalSequence": false,
                     "suggestedTransition": "cut"}
                ]
            },
            {
                "id": "a2", "audioFile": "/music/a.wav", "tempo": 124.0,
                "startTime": 8.0, "endTime": 16.0, "links": []
            },
            {
                "id": "b1", "audioFile": "/music/b.wav", "tempo": 126.0, "key": null,
                "startTime": 0.0, "endTime": 12.0
            }
        ],
        "edges": [
            {"sourceId": "a2", "targetId": "b1", "weight": 0.7, "suggestedTransition": "eqSwap"}
        ]
    }"#;

    #[test]
    fn test_parse_graph_file() {
        let graph = PhraseGraph::from_json(GRAPH_JSON).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.created_at.as_deref(), Some("2024-05-01T12:00:00+00:00"));

        let a1 = graph.node("a1").unwrap();
        assert_eq!(a1.beats, vec![0.0, 0.48, 0.97]);
        assert_eq!(a1.musical_key(), MusicalKey::parse("Am"));
        // Dangling link dropped
        assert_eq!(a1.links.len(), 1);
        assert_eq!(
            a1.links[0].suggested_transition,
            Some(TransitionType::Crossfade)
        );

        // Edge merged into links
        let a2 = graph.node("a2").unwrap();
        assert_eq!(a2.links.len(), 1);
        assert_eq!(a2.links[0].target_id, "b1");
        assert_eq!(a2.links[0].suggested_transition, Some(TransitionType::EqSwap));

        assert!(graph.node("b1").unwrap().musical_key().is_none());
        assert_eq!(graph.songs().len(), 2);
    }

    #[test]
    fn test_sequence_queries() {
        let graph = PhraseGraph::from_json(GRAPH_JSON).unwrap();
        let a1 = graph.index_of("a1").unwrap();
        let a2 = graph.index_of("a2").unwrap();
        let b1 = graph.index_of("b1").unwrap();
        assert!(graph.is_sequential(a1, a2));
        assert!(!graph.is_sequential(a2, b1));
        assert_eq!(graph.successor(a1), Some(a2));
        assert_eq!(graph.successor(a2), None);
        assert_eq!(graph.successor(b1), None);
    }

    #[test]
    fn test_rejects_duplicates() {
        let nodes = vec![
            PhraseNode::new("x", "s.wav", 0.0, 1.0),
            PhraseNode::new("x", "s.wav", 1.0, 2.0),
        ];
        assert!(matches!(PhraseGraph::new(nodes), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            PhraseGraph::from_json("{\"nodes\": [{\"id\": 5}]}"),
            Err(Error::GraphParse(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_camel_case() {
        let graph = PhraseGraph::new(vec![PhraseNode::new("x", "s.wav", 0.0, 1.0)]).unwrap();
        let json = graph.to_json().unwrap();
        assert!(json.contains("\"audioFile\""));
        assert!(json.contains("\"startTime\""));
        let back = PhraseGraph::from_json(&json).unwrap();
        assert_eq!(back.node("x"), graph.node("x"));
    }

    #[test]
    fn test_from_reader() {
        use std::io::{Seek, SeekFrom, Write};

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(GRAPH_JSON.as_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let graph = PhraseGraph::from_reader(std::io::BufReader::new(file)).unwrap();
        assert_eq!(graph.songs().len(), 2);
        assert!(PhraseGraph::from_reader(&b"{ not json"[..]).is_err());
    }

    #[test]
    fn test_suggest_transition() {
        assert_eq!(suggest_transition(0.85, 0.0), TransitionType::Crossfade);
        assert_eq!(suggest_transition(0.7, 0.5), TransitionType::EqSwap);
        assert_eq!(suggest_transition(0.5, -0.4), TransitionType::Filter);
        assert_eq!(suggest_transition(0.5, 0.1), TransitionType::Cut);
        assert_eq!(suggest_transition(0.2, 0.9), TransitionType::Cut);
    }
}
