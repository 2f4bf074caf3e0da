//! Telephony media frame envelope.
//!
//! The platform streams JSON frames over the media WebSocket:
//!
//! ```json
//! {"Kind": "AudioData", "AudioData": {"Data": "<base64 PCM>", "Timestamp": "...",
//!  "ParticipantRawID": "...", "Silent": false}, "StopAudio": null}
//! ```
//!
//! Inbound frames are accepted with PascalCase or camelCase keys. Outbound
//! frames are always PascalCase. Audio is decoded from base64 here so nothing
//! past this module handles encoded payloads.

use base64::prelude::*;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid frame JSON: {0}")]
    Json(String),

    #[error("AudioData frame without an AudioData body")]
    MissingAudioData,

    #[error("Invalid base64 audio: {0}")]
    InvalidAudio(String),
}

pub type FrameResult<T> = Result<T, FrameError>;

// =============================================================================
// Inbound
// =============================================================================

/// One decoded audio frame from the caller side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw PCM16 little-endian samples
    pub pcm: Bytes,
    pub timestamp: Option<String>,
    pub participant_raw_id: Option<String>,
    pub silent: bool,
}

/// Stream metadata sent once at the start of a media session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MediaMetadata {
    #[serde(default, rename = "subscriptionId", alias = "SubscriptionId")]
    pub subscription_id: Option<String>,
    #[serde(default, alias = "Encoding")]
    pub encoding: Option<String>,
    #[serde(default, rename = "sampleRate", alias = "SampleRate")]
    pub sample_rate: Option<u32>,
    #[serde(default, alias = "Channels")]
    pub channels: Option<u16>,
}

/// A parsed inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Audio(AudioFrame),
    StopAudio,
    Metadata(MediaMetadata),
    /// A frame kind the gateway does not handle
    Unknown(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "Kind", alias = "kind")]
    kind: String,
    #[serde(default, rename = "AudioData", alias = "audioData")]
    audio_data: Option<RawAudioData>,
    #[serde(default, rename = "AudioMetadata", alias = "audioMetadata")]
    audio_metadata: Option<MediaMetadata>,
}

#[derive(Deserialize)]
struct RawAudioData {
    #[serde(rename = "Data", alias = "data")]
    data: String,
    #[serde(default, rename = "Timestamp", alias = "timestamp")]
    timestamp: Option<String>,
    #[serde(
        default,
        rename = "ParticipantRawID",
        alias = "participantRawID",
        alias = "participantRawId"
    )]
    participant_raw_id: Option<String>,
    #[serde(default, rename = "Silent", alias = "silent")]
    silent: bool,
}

impl InboundFrame {
    /// Parse a text frame received from the telephony transport.
    pub fn parse(text: &str) -> FrameResult<Self> {
        let raw: RawFrame =
            serde_json::from_str(text).map_err(|e| FrameError::Json(e.to_string()))?;

        match raw.kind.as_str() {
            "AudioData" => {
                let audio = raw.audio_data.ok_or(FrameError::MissingAudioData)?;
                let pcm = BASE64_STANDARD
                    .decode(audio.data.as_bytes())
                    .map_err(|e| FrameError::InvalidAudio(e.to_string()))?;
                Ok(InboundFrame::Audio(AudioFrame {
                    pcm: Bytes::from(pcm),
                    timestamp: audio.timestamp,
                    participant_raw_id: audio.participant_raw_id,
                    silent: audio.silent,
                }))
            }
            "StopAudio" => Ok(InboundFrame::StopAudio),
            "AudioMetadata" => Ok(InboundFrame::Metadata(raw.audio_metadata.unwrap_or_default())),
            other => Ok(InboundFrame::Unknown(other.to_string())),
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// A frame written back to the telephony transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// PCM16 audio at the telephony sample rate
    Audio(Bytes),
    /// Cut off any audio the platform is still playing
    StopAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    kind: &'static str,
    audio_data: Option<OutboundAudioData>,
    stop_audio: Option<StopAudioBody>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutboundAudioData {
    data: String,
}

#[derive(Serialize)]
struct StopAudioBody {}

impl OutboundFrame {
    /// Serialize into the platform's JSON envelope.
    pub fn to_json(&self) -> String {
        let envelope = match self {
            OutboundFrame::Audio(pcm) => Envelope {
                kind: "AudioData",
                audio_data: Some(OutboundAudioData {
                    data: BASE64_STANDARD.encode(pcm),
                }),
                stop_audio: None,
            },
            OutboundFrame::StopAudio => Envelope {
                kind: "StopAudio",
                audio_data: None,
                stop_audio: Some(StopAudioBody {}),
            },
        };
        // Plain strings and options only; serialization cannot fail.
        serde_json::to_string(&envelope).unwrap_or_default()
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, OutboundFrame::StopAudio)
    }
}
