//! Voice Live endpoint configuration.

use url::Url;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Default Voice Live API version.
pub const DEFAULT_VOICE_LIVE_API_VERSION: &str = "2025-05-01-preview";

/// Default model deployment.
pub const DEFAULT_VOICE_LIVE_MODEL: &str = "gpt-4o-realtime-preview";

/// Path of the realtime WebSocket below the resource endpoint.
const REALTIME_PATH: &str = "voice-live/realtime";

/// Connection settings for a Voice Live resource.
#[derive(Debug, Clone)]
pub struct VoiceLiveConfig {
    /// Resource endpoint, e.g. `https://my-resource.cognitiveservices.azure.com`
    pub endpoint: String,
    /// Resource key sent as the `api-key` header
    pub api_key: String,
    /// Model deployment name
    pub model: String,
    pub api_version: String,
}

impl VoiceLiveConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: DEFAULT_VOICE_LIVE_MODEL.to_string(),
            api_version: DEFAULT_VOICE_LIVE_API_VERSION.to_string(),
        }
    }

    /// Build the WebSocket URL, mapping `https` to `wss` and `http` to `ws`.
    pub fn websocket_url(&self) -> RealtimeResult<Url> {
        let base = self.endpoint.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if base.starts_with("wss://") || base.starts_with("ws://") {
            base.to_string()
        } else {
            return Err(RealtimeError::InvalidConfiguration(format!(
                "Unsupported speech endpoint scheme: {}",
                self.endpoint
            )));
        };

        let mut url = Url::parse(&format!("{base}/{REALTIME_PATH}")).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid speech endpoint: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version)
            .append_pair("model", &self.model);
        Ok(url)
    }
}
