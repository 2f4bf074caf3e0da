//! In-memory stand-ins for the telephony platform, the speech service and the
//! media WebSocket.
//!
//! Every mock records what the gateway did to it so tests can assert on call
//! order and on release counts.

// Not every test binary uses every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use voice_call_gateway::ServerConfig;
use voice_call_gateway::bridge::{
    FrameSink, FrameSource, TelephonyTransport, TransportError, TransportMessage,
};
use voice_call_gateway::call::IdempotencyScope;
use voice_call_gateway::core::realtime::messages::SessionInfo;
use voice_call_gateway::core::realtime::{
    ClientEvent, RealtimeError, RealtimeResult, ServerEvent, SpeechConnection, SpeechConnector,
    SpeechTransport,
};
use voice_call_gateway::core::telephony::{
    AnswerCallRequest, CallAutomation, CallConnectionProperties, CreateCallRequest,
    PlayTextRequest, TelephonyError, TelephonyResult,
};
use voice_call_gateway::speech::PersonaConfig;

// =============================================================================
// Configuration
// =============================================================================

/// A complete configuration pointing at nothing real.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        acs_connection_string: Some(
            "endpoint=https://test.communication.azure.com/;accesskey=dGVzdC1rZXk=".to_string(),
        ),
        acs_api_version: "2024-09-15".to_string(),
        cognitive_services_endpoint: Some("https://speech.example.com/".to_string()),
        agent_phone_number: Some("+14255550100".to_string()),
        default_target_phone_number: None,
        callback_uri_host: Some("https://gateway.example.com".to_string()),
        telephony_sample_rate: 24000,
        media_grace_ms: 100,
        voice_live_endpoint: Some("https://voice.example.com".to_string()),
        voice_live_api_key: Some("test-voice-key".to_string()),
        voice_live_model: "gpt-4o-realtime-preview".to_string(),
        voice_live_api_version: "2025-05-01-preview".to_string(),
        speech_sample_rate: 24000,
        speech_connect_timeout_seconds: 2,
        persona: PersonaConfig::default(),
        personas: HashMap::new(),
        fallback_announcement: "Sorry, please call back later.".to_string(),
        fallback_voice: None,
        idempotency_scope: IdempotencyScope::Process,
        idempotency_capacity: 64,
        cache_ttl_seconds: 60,
        rate_limit_requests_per_second: None,
        rate_limit_burst_size: 10,
    }
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Call Automation
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TelephonyCall {
    Answer(AnswerCallRequest),
    Create(CreateCallRequest),
    Play { call_id: String, request: PlayTextRequest },
    HangUp(String),
}

/// Records every call-control request and hands out `call-1`, `call-2`, ...
#[derive(Default)]
pub struct MockCallAutomation {
    calls: Mutex<Vec<TelephonyCall>>,
    next_id: AtomicUsize,
    pub fail_answer: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_play: AtomicBool,
}

impl MockCallAutomation {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<TelephonyCall> {
        self.calls.lock().clone()
    }

    pub fn answers(&self) -> Vec<AnswerCallRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TelephonyCall::Answer(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn plays(&self) -> Vec<(String, PlayTextRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TelephonyCall::Play { call_id, request } => Some((call_id, request)),
                _ => None,
            })
            .collect()
    }

    pub fn hang_ups(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TelephonyCall::HangUp(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn connection(&self) -> CallConnectionProperties {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        CallConnectionProperties {
            call_connection_id: format!("call-{n}"),
            server_call_id: Some(format!("srv-{n}")),
            correlation_id: None,
            call_connection_state: Some("connecting".to_string()),
        }
    }

    fn rejected() -> TelephonyError {
        TelephonyError::Api {
            status: 400,
            message: "rejected by mock".to_string(),
        }
    }
}

#[async_trait]
impl CallAutomation for MockCallAutomation {
    async fn answer_call(
        &self,
        request: &AnswerCallRequest,
    ) -> TelephonyResult<CallConnectionProperties> {
        self.calls.lock().push(TelephonyCall::Answer(request.clone()));
        if self.fail_answer.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(self.connection())
    }

    async fn create_call(
        &self,
        request: &CreateCallRequest,
    ) -> TelephonyResult<CallConnectionProperties> {
        self.calls.lock().push(TelephonyCall::Create(request.clone()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(self.connection())
    }

    async fn play_text(&self, call_id: &str, request: &PlayTextRequest) -> TelephonyResult<()> {
        self.calls.lock().push(TelephonyCall::Play {
            call_id: call_id.to_string(),
            request: request.clone(),
        });
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Self::rejected());
        }
        Ok(())
    }

    async fn hang_up(&self, call_id: &str) -> TelephonyResult<()> {
        self.calls
            .lock()
            .push(TelephonyCall::HangUp(call_id.to_string()));
        Ok(())
    }
}

// =============================================================================
// Speech
// =============================================================================

/// Sending half of a mock speech connection.
#[derive(Default)]
pub struct MockSpeechTransport {
    sent: Mutex<Vec<ClientEvent>>,
    closes: AtomicUsize,
    closed: AtomicBool,
}

impl MockSpeechTransport {
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().clone()
    }

    pub fn sent_types(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(ClientEvent::event_type).collect()
    }

    pub fn audio_appends(&self) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|e| matches!(e, ClientEvent::InputAudioBufferAppend { .. }))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechTransport for MockSpeechTransport {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        self.sent.lock().push(event);
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

/// How the mock speech service behaves on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechBehavior {
    /// Accept and acknowledge the session
    #[default]
    Accept,
    /// Refuse the connection
    Refuse,
    /// Accept the socket but never acknowledge the session
    Silent,
}

/// Opens one [`MockSpeechTransport`] per call and keeps the server side of
/// each connection so tests can push events.
#[derive(Default)]
pub struct MockSpeechConnector {
    behavior: Mutex<SpeechBehavior>,
    connects: AtomicUsize,
    transports: Mutex<HashMap<String, Arc<MockSpeechTransport>>>,
    servers: Mutex<HashMap<String, mpsc::Sender<ServerEvent>>>,
}

impl MockSpeechConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_behavior(behavior: SpeechBehavior) -> Arc<Self> {
        let connector = Self::default();
        *connector.behavior.lock() = behavior;
        Arc::new(connector)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn transport(&self, call_id: &str) -> Option<Arc<MockSpeechTransport>> {
        self.transports.lock().get(call_id).cloned()
    }

    /// Push a server event to the call's session.
    pub async fn push(&self, call_id: &str, event: ServerEvent) -> bool {
        let sender = self.servers.lock().get(call_id).cloned();
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Drop the server side, ending the call's event stream.
    pub fn hang_up(&self, call_id: &str) {
        self.servers.lock().remove(call_id);
    }
}

#[async_trait]
impl SpeechConnector for MockSpeechConnector {
    async fn connect(&self, call_id: &str) -> RealtimeResult<SpeechConnection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock();
        if behavior == SpeechBehavior::Refuse {
            return Err(RealtimeError::ConnectionFailed(
                "connection refused by mock".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(64);
        if behavior == SpeechBehavior::Accept {
            let _ = tx
                .send(ServerEvent::SessionCreated {
                    session: SessionInfo {
                        id: Some(format!("sess-{call_id}")),
                        model: None,
                    },
                })
                .await;
        }

        let transport = Arc::new(MockSpeechTransport::default());
        self.transports
            .lock()
            .insert(call_id.to_string(), transport.clone());
        self.servers.lock().insert(call_id.to_string(), tx);

        Ok(SpeechConnection {
            transport,
            events: rx,
        })
    }
}

/// An assistant audio chunk as the speech service would send it.
pub fn audio_delta(pcm: &[u8], item_id: &str) -> ServerEvent {
    ServerEvent::ResponseAudioDelta {
        response_id: Some("resp-1".to_string()),
        item_id: Some(item_id.to_string()),
        delta: base64_encode(pcm),
    }
}

pub fn speech_started() -> ServerEvent {
    ServerEvent::SpeechStarted {
        item_id: Some("user-item".to_string()),
        audio_start_ms: Some(0),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

// =============================================================================
// Media transport
// =============================================================================

struct ChannelSource {
    rx: mpsc::Receiver<TransportMessage>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_message(&mut self) -> Option<Result<TransportMessage, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

struct RecordingSink {
    shared: Arc<MediaShared>,
}

#[derive(Default)]
struct MediaShared {
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.shared.sent.lock().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The test's side of an in-memory media WebSocket.
pub struct MediaPeer {
    inbound: Option<mpsc::Sender<TransportMessage>>,
    shared: Arc<MediaShared>,
}

impl MediaPeer {
    /// Create a transport for the gateway and the peer that drives it.
    pub fn pair() -> (TelephonyTransport, MediaPeer) {
        let (tx, rx) = mpsc::channel(64);
        let shared = Arc::new(MediaShared::default());
        let transport = TelephonyTransport::new(
            Box::new(ChannelSource { rx }),
            Box::new(RecordingSink {
                shared: shared.clone(),
            }),
        );
        (
            transport,
            MediaPeer {
                inbound: Some(tx),
                shared,
            },
        )
    }

    /// Send caller audio the way the platform frames it.
    pub async fn send_audio(&self, pcm: &[u8]) -> bool {
        let frame = json!({
            "Kind": "AudioData",
            "AudioData": {
                "Data": base64_encode(pcm),
                "Timestamp": "2024-01-01T00:00:00Z",
                "ParticipantRawID": "4:+14255550123",
                "Silent": false
            }
        });
        match &self.inbound {
            Some(tx) => tx
                .send(TransportMessage::Text(frame.to_string()))
                .await
                .is_ok(),
            None => false,
        }
    }

    pub async fn send_binary(&self, pcm: &[u8]) -> bool {
        match &self.inbound {
            Some(tx) => tx
                .send(TransportMessage::Binary(Bytes::copy_from_slice(pcm)))
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Simulate the platform dropping the socket.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    pub fn sent(&self) -> Vec<String> {
        self.shared.sent.lock().clone()
    }

    /// `Kind` of every frame written to the platform, in order.
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|text| {
                serde_json::from_str::<serde_json::Value>(text)
                    .ok()
                    .and_then(|v| v.get("Kind").and_then(|k| k.as_str()).map(str::to_string))
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}
