//! Call Automation REST request and response bodies.

use serde::{Deserialize, Serialize};

// =============================================================================
// Media Streaming
// =============================================================================

/// PCM format of the media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm16KMono")]
    Pcm16KMono,
    #[serde(rename = "pcm24KMono")]
    Pcm24KMono,
}

impl AudioFormat {
    /// The platform format for a sample rate, if one exists.
    pub fn for_sample_rate(sample_rate: u32) -> Option<Self> {
        match sample_rate {
            16000 => Some(Self::Pcm16KMono),
            24000 => Some(Self::Pcm24KMono),
            _ => None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16KMono => 16000,
            Self::Pcm24KMono => 24000,
        }
    }
}

/// Media streaming configuration sent with answer and create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamingOptions {
    pub transport_url: String,
    pub transport_type: String,
    pub content_type: String,
    pub audio_channel_type: String,
    pub start_media_streaming: bool,
    pub enable_bidirectional: bool,
    pub audio_format: AudioFormat,
}

impl MediaStreamingOptions {
    /// Bidirectional mixed-channel audio over a WebSocket, started on connect.
    pub fn bidirectional(transport_url: impl Into<String>, audio_format: AudioFormat) -> Self {
        Self {
            transport_url: transport_url.into(),
            transport_type: "websocket".to_string(),
            content_type: "audio".to_string(),
            audio_channel_type: "mixed".to_string(),
            start_media_streaming: true,
            enable_bidirectional: true,
            audio_format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallIntelligenceOptions {
    pub cognitive_services_endpoint: String,
}

// =============================================================================
// Identifiers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub value: String,
}

/// A phone number participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationIdentifier {
    pub raw_id: String,
    pub kind: String,
    pub phone_number: PhoneNumber,
}

impl CommunicationIdentifier {
    pub fn phone(number: impl Into<String>) -> Self {
        let value = number.into();
        Self {
            raw_id: format!("4:{value}"),
            kind: "phoneNumber".to_string(),
            phone_number: PhoneNumber { value },
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallRequest {
    pub incoming_call_context: String,
    pub callback_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_intelligence_options: Option<CallIntelligenceOptions>,
    pub media_streaming_options: MediaStreamingOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCallRequest {
    pub targets: Vec<CommunicationIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_caller_id_number: Option<PhoneNumber>,
    pub callback_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_intelligence_options: Option<CallIntelligenceOptions>,
    pub media_streaming_options: MediaStreamingOptions,
}

/// A text announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayTextRequest {
    pub text: String,
    pub voice_name: Option<String>,
    /// Echoed back on the resulting `PlayCompleted`/`PlayFailed` callback
    pub operation_context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayBody<'a> {
    pub play_sources: Vec<PlaySource<'a>>,
    pub play_to: Vec<CommunicationIdentifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_context: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaySource<'a> {
    pub kind: &'static str,
    pub text: TextSource<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextSource<'a> {
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_name: Option<&'a str>,
}

impl<'a> From<&'a PlayTextRequest> for PlayBody<'a> {
    fn from(request: &'a PlayTextRequest) -> Self {
        Self {
            play_sources: vec![PlaySource {
                kind: "text",
                text: TextSource {
                    text: &request.text,
                    voice_name: request.voice_name.as_deref(),
                },
            }],
            play_to: Vec::new(),
            operation_context: request.operation_context.as_deref(),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

/// Call connection as returned by answer and create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallConnectionProperties {
    pub call_connection_id: String,
    #[serde(default)]
    pub server_call_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub call_connection_state: Option<String>,
}
