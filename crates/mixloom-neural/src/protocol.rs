//! Wire protocol spoken with the neural synthesis server.
//!
//! Control messages are UTF-8 JSON objects terminated by a single `0x00`.
//! Audio replies are `[u32 little-endian byte length][f32 little-endian mono samples]`.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Control message terminator.
pub const MESSAGE_TERMINATOR: u8 = 0;

/// Upper bound on an audio frame payload; anything larger is treated as corrupt.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Latent frames per `generate` request when not configured.
pub const DEFAULT_FRAMES: u32 = 50;

/// Style and expression controls for the neural model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralControls {
    /// Style name to weight; weights need not sum to 1
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style_blend: BTreeMap<String, f32>,
    pub energy: f32,
    pub tempo_factor: f32,
    pub variation: f32,
}

impl Default for NeuralControls {
    fn default() -> Self {
        Self {
            style_blend: BTreeMap::new(),
            energy: 0.5,
            tempo_factor: 1.0,
            variation: 0.5,
        }
    }
}

impl NeuralControls {
    /// Clamp to the ranges the server accepts.
    pub fn sanitized(&self) -> Self {
        Self {
            style_blend: self
                .style_blend
                .iter()
                .filter(|(_, w)| w.is_finite() && **w > 0.0)
                .map(|(k, w)| (k.clone(), *w))
                .collect(),
            energy: self.energy.clamp(0.0, 1.0),
            tempo_factor: self.tempo_factor.clamp(0.5, 2.0),
            variation: self.variation.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlRequest {
    GetStyles,
    SetControls {
        #[serde(flatten)]
        controls: NeuralControls,
    },
    Generate {
        frames: u32,
        #[serde(flatten)]
        controls: NeuralControls,
    },
}

impl ControlRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetStyles => "get_styles",
            Self::SetControls { .. } => "set_controls",
            Self::Generate { .. } => "generate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Styles { styles: Vec<String> },
    Status { status: String },
    Error { error: String },
}

/// Serialize a request with its terminator.
pub fn encode_request(request: &ControlRequest) -> Result<Vec<u8>> {
    let mut data = serde_json::to_vec(request)?;
    data.push(MESSAGE_TERMINATOR);
    Ok(data)
}

/// Parse a response body (terminator already stripped).
///
/// `{"error": ...}` replies become [`BridgeError::Remote`].
pub fn decode_response(body: &[u8]) -> Result<ControlResponse> {
    match serde_json::from_slice(body)? {
        ControlResponse::Error { error } => Err(BridgeError::Remote(error)),
        response => Ok(response),
    }
}

/// Validate an audio frame header. Returns the payload length in bytes.
pub fn check_frame_len(len: u32) -> Result<usize> {
    let len = len as usize;
    if len == 0 {
        return Err(BridgeError::InvalidFrame("empty frame".into()));
    }
    if len > MAX_FRAME_BYTES {
        return Err(BridgeError::InvalidFrame(format!(
            "{len} bytes exceeds the {MAX_FRAME_BYTES} byte limit"
        )));
    }
    if len % 4 != 0 {
        return Err(BridgeError::InvalidFrame(format!(
            "{len} bytes is not a whole number of f32 samples"
        )));
    }
    Ok(len)
}

/// Payload bytes to samples.
pub fn decode_samples(payload: &[u8]) -> Vec<f32> {
    payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Decode a complete `[len][payload]` audio frame.
pub fn decode_audio_frame(frame: &[u8]) -> Result<Vec<f32>> {
    let header: [u8; 4] = frame
        .get(..4)
        .and_then(|h| h.try_into().ok())
        .ok_or_else(|| BridgeError::InvalidFrame("truncated header".into()))?;
    let len = check_frame_len(u32::from_le_bytes(header))?;
    let payload = &frame[4..];
    if payload.len() != len {
        return Err(BridgeError::InvalidFrame(format!(
            "header says {len} bytes, got {}",
            payload.len()
        )));
    }
    Ok(decode_samples(payload))
}

/// Build an audio frame, as the server sends it.
pub fn encode_audio_frame(samples: &[f32]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + samples.len() * 4);
    frame.extend_from_slice(&((samples.len() * 4) as u32).to_le_bytes());
    for s in samples {
        frame.extend_from_slice(&s.to_le_bytes());
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_three_samples() {
        let mut frame = 12u32.to_le_bytes().to_vec();
        for s in [0.25f32, -1.0, 0.5] {
            frame.extend_from_slice(&s.to_le_bytes());
        }
        assert_eq!(decode_audio_frame(&frame).unwrap(), vec![0.25, -1.0, 0.5]);
    }

    #[test]
    fn test_reject_bad_lengths() {
        assert!(matches!(
            decode_audio_frame(&0u32.to_le_bytes()),
            Err(BridgeError::InvalidFrame(_))
        ));
        let huge = ((MAX_FRAME_BYTES + 4) as u32).to_le_bytes();
        assert!(matches!(
            decode_audio_frame(&huge),
            Err(BridgeError::InvalidFrame(_))
        ));
        assert!(check_frame_len(6).is_err());
        assert!(decode_audio_frame(&[1, 0]).is_err());

        let mut short = 8u32.to_le_bytes().to_vec();
        short.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(decode_audio_frame(&short).is_err());
    }

    #[test]
    fn test_generate_request_shape() {
        let mut controls = NeuralControls::default();
        controls.style_blend.insert("ambient".into(), 0.7);
        let data = encode_request(&ControlRequest::Generate {
            frames: DEFAULT_FRAMES,
            controls,
        })
        .unwrap();
        assert_eq!(*data.last().unwrap(), MESSAGE_TERMINATOR);

        let json: serde_json::Value = serde_json::from_slice(&data[..data.len() - 1]).unwrap();
        assert_eq!(json["command"], "generate");
        assert_eq!(json["frames"], 50);
        assert_eq!(json["energy"], 0.5);
        assert_eq!(json["tempo_factor"], 1.0);
        assert_eq!(json["style_blend"]["ambient"].as_f64().unwrap() as f32, 0.7);
    }

    #[test]
    fn test_get_styles_has_no_controls() {
        let data = encode_request(&ControlRequest::GetStyles).unwrap();
        assert_eq!(&data[..data.len() - 1], br#"{"command":"get_styles"}"#);
    }

    #[test]
    fn test_decode_responses() {
        assert_eq!(
            decode_response(br#"{"styles":["ambient","techno"]}"#).unwrap(),
            ControlResponse::Styles {
                styles: vec!["ambient".into(), "techno".into()]
            }
        );
        assert_eq!(
            decode_response(br#"{"status":"ok"}"#).unwrap(),
            ControlResponse::Status {
                status: "ok".into()
            }
        );
        match decode_response(br#"{"error":"Unknown command: dance"}"#) {
            Err(BridgeError::Remote(msg)) => assert!(msg.contains("dance")),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn test_controls_sanitized() {
        let mut controls = NeuralControls {
            energy: 3.0,
            tempo_factor: 0.1,
            variation: -1.0,
            ..Default::default()
        };
        controls.style_blend.insert("gone".into(), 0.0);
        let clean = controls.sanitized();
        assert_eq!(clean.energy, 1.0);
        assert_eq!(clean.tempo_factor, 0.5);
        assert_eq!(clean.variation, 0.0);
        assert!(clean.style_blend.is_empty());
    }
}
