//! Call Automation REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;

use super::auth::AcsCredentials;
use crate::core::telephony::base::{CallAutomation, TelephonyError, TelephonyResult};
use crate::core::telephony::models::{
    AnswerCallRequest, CallConnectionProperties, CreateCallRequest, PlayBody, PlayTextRequest,
};

/// Default Call Automation API version.
pub const DEFAULT_ACS_API_VERSION: &str = "2024-09-15";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("voice-call-gateway/", env!("CARGO_PKG_VERSION"));

/// Azure Communication Services Call Automation client.
pub struct AcsCallAutomationClient {
    credentials: AcsCredentials,
    api_version: String,
    http_client: Client,
}

impl std::fmt::Debug for AcsCallAutomationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcsCallAutomationClient")
            .field("credentials", &self.credentials)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AcsCallAutomationClient {
    pub fn new(connection_string: &str, api_version: impl Into<String>) -> TelephonyResult<Self> {
        let credentials = AcsCredentials::from_connection_string(connection_string)?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TelephonyError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            credentials,
            api_version: api_version.into(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> TelephonyResult<Url> {
        let mut url = self
            .credentials
            .endpoint()
            .join(path)
            .map_err(|e| TelephonyError::InvalidUrl(format!("{path}: {e}")))?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    /// Send a signed request and return the response body on success.
    async fn send(&self, method: Method, url: Url, body: Vec<u8>) -> TelephonyResult<String> {
        let signed = self
            .credentials
            .sign(method.as_str(), &url, &body, OffsetDateTime::now_utc())?;

        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .header("x-ms-date", &signed.date)
            .header("x-ms-content-sha256", &signed.content_hash)
            .header("Authorization", &signed.authorization);
        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TelephonyError::Request(format!("{method} {}: {e}", url.path())))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TelephonyError::Request(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TelephonyError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        debug!(status = %status, path = %url.path(), "Call Automation request succeeded");
        Ok(text)
    }

    async fn send_json<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> TelephonyResult<R> {
        let url = self.url(path)?;
        let body =
            serde_json::to_vec(body).map_err(|e| TelephonyError::Serialization(e.to_string()))?;
        let text = self.send(method, url, body).await?;
        serde_json::from_str(&text).map_err(|e| TelephonyError::Serialization(e.to_string()))
    }
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CallAutomation for AcsCallAutomationClient {
    async fn answer_call(
        &self,
        request: &AnswerCallRequest,
    ) -> TelephonyResult<CallConnectionProperties> {
        let props: CallConnectionProperties = self
            .send_json(Method::POST, "calling/callConnections:answer", request)
            .await?;
        info!(call_id = %props.call_connection_id, "Answered call");
        Ok(props)
    }

    async fn create_call(
        &self,
        request: &CreateCallRequest,
    ) -> TelephonyResult<CallConnectionProperties> {
        let props: CallConnectionProperties = self
            .send_json(Method::POST, "calling/callConnections", request)
            .await?;
        info!(call_id = %props.call_connection_id, "Created outbound call");
        Ok(props)
    }

    async fn play_text(&self, call_id: &str, request: &PlayTextRequest) -> TelephonyResult<()> {
        let url = self.url(&format!("calling/callConnections/{call_id}:play"))?;
        let body = serde_json::to_vec(&PlayBody::from(request))
            .map_err(|e| TelephonyError::Serialization(e.to_string()))?;
        self.send(Method::POST, url, body).await?;
        info!(call_id = %call_id, "Requested announcement playback");
        Ok(())
    }

    async fn hang_up(&self, call_id: &str) -> TelephonyResult<()> {
        let url = self.url(&format!("calling/callConnections/{call_id}"))?;
        self.send(Method::DELETE, url, Vec::new()).await?;
        info!(call_id = %call_id, "Hung up call");
        Ok(())
    }
}
