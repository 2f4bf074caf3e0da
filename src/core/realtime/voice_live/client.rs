//! Voice Live WebSocket client.
//!
//! Each call gets its own socket. A background task owns both halves of the
//! WebSocket: it drains a bounded channel of [`ClientEvent`]s into the sink and
//! parses incoming text frames into [`ServerEvent`]s for the call's dispatch
//! loop. The task ends when the server closes, the socket errors, the event
//! receiver is dropped, or the transport is closed locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

use super::config::VoiceLiveConfig;
use crate::core::realtime::base::{
    RealtimeError, RealtimeResult, SpeechConnection, SpeechConnector, SpeechTransport,
};
use crate::core::realtime::messages::{ClientEvent, ServerEvent};

/// Channel capacity for outgoing client events.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for incoming server events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close` waits for the socket task to send its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Connector
// =============================================================================

/// Opens Voice Live sessions.
#[derive(Debug, Clone)]
pub struct VoiceLiveConnector {
    config: VoiceLiveConfig,
}

impl VoiceLiveConnector {
    pub fn new(config: VoiceLiveConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "Voice Live API key is empty".to_string(),
            ));
        }
        config.websocket_url()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &VoiceLiveConfig {
        &self.config
    }
}

fn map_handshake_error(err: tungstenite::Error) -> RealtimeError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                RealtimeError::AuthenticationFailed(format!("Handshake rejected with {status}"))
            } else {
                RealtimeError::ConnectionFailed(format!("Handshake rejected with {status}"))
            }
        }
        other => RealtimeError::ConnectionFailed(other.to_string()),
    }
}

#[async_trait]
impl SpeechConnector for VoiceLiveConnector {
    async fn connect(&self, call_id: &str) -> RealtimeResult<SpeechConnection> {
        let url = self.config.websocket_url()?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("Invalid API key: {e}")))?;
        let request_id_value = HeaderValue::from_str(&request_id)
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert("api-key", api_key);
        request
            .headers_mut()
            .insert("x-ms-client-request-id", request_id_value);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(map_handshake_error)?;

        info!(call_id = %call_id, request_id = %request_id, "Connected to Voice Live");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel::<ServerEvent>(EVENT_CHANNEL_CAPACITY);

        let open = Arc::new(AtomicBool::new(true));
        let task_open = open.clone();
        let task_call_id = call_id.to_string();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = rx.recv() => match outgoing {
                        Some(event) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(j) => j,
                                Err(e) => {
                                    error!("Failed to serialize event: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                error!(call_id = %task_call_id, "Failed to send WebSocket message: {}", e);
                                break;
                            }
                        }
                        None => {
                            // Local close
                            let _ = ws_sink.send(Message::Close(None)).await;
                            break;
                        }
                    },

                    incoming = ws_stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerEvent>(&text) {
                                Ok(event) => {
                                    if events_tx.send(event).await.is_err() {
                                        debug!(call_id = %task_call_id, "Event receiver dropped");
                                        break;
                                    }
                                }
                                Err(e) => {
                                    warn!(call_id = %task_call_id, "Failed to parse server event: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            info!(call_id = %task_call_id, "Voice Live WebSocket closed by server");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                error!("Failed to send pong: {}", e);
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(call_id = %task_call_id, "WebSocket error: {}", e);
                            break;
                        }
                        None => break,
                    },
                }
            }

            task_open.store(false, Ordering::SeqCst);
            debug!(call_id = %task_call_id, "Voice Live connection task finished");
        });

        let transport = VoiceLiveTransport {
            sender: Mutex::new(Some(tx)),
            open,
            handle: Mutex::new(Some(handle)),
        };

        Ok(SpeechConnection {
            transport: Arc::new(transport),
            events: events_rx,
        })
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Sending half of a Voice Live connection.
pub struct VoiceLiveTransport {
    sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    open: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl SpeechTransport for VoiceLiveTransport {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.sender.lock().clone().ok_or(RealtimeError::NotConnected)?;
        sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    async fn close(&self) {
        // Dropping the sender makes the socket task send a close frame and exit.
        let sender = self.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(CLOSE_TIMEOUT, handle).await.is_err() {
                warn!("Voice Live socket task did not finish in time, aborting");
                abort.abort();
            }
        }
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for VoiceLiveTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}
