//! Call orchestrator.
//!
//! The only writer of call state. Webhook handlers, the media WebSocket and
//! per-call tasks feed it; it answers calls, opens speech sessions, starts
//! bridges and owns teardown.
//!
//! Per-call tasks report through a [`CallSignal`] channel drained by a control
//! loop, so teardown never runs inside the task being torn down.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use super::dedup::EventDeduplicator;
use super::error::{CallError, CallResult};
use super::registry::{CallEntry, CallRegistry, SharedCallEntry};
use super::session::{CallDirection, CallSession};
use super::signal::{CallSignal, SignalReceiver, SignalSender, signal_channel};
use super::state::{CallState, CallTrigger};
use crate::bridge::{
    AudioBridge, BridgeConfig, DEFAULT_OUTBOUND_CAPACITY, TelephonyTransport, outbound_channel,
};
use crate::core::store::{SessionStore, keys};
use crate::core::telephony::events::{CallbackEvent, CallbackKind, IncomingCallEvent};
use crate::core::telephony::{
    AnswerCallRequest, AudioFormat, CallAutomation, CallIntelligenceOptions,
    CommunicationIdentifier, CreateCallRequest, MediaStreamingOptions, PhoneNumber,
    PlayTextRequest,
};
use crate::speech::SpeechSessionManager;

/// Operation context attached to the fallback announcement.
pub const FALLBACK_OPERATION_CONTEXT: &str = "fallback-announcement";

pub const DEFAULT_FALLBACK_ANNOUNCEMENT: &str = "We're sorry, our assistant is unavailable right now. Please call again later. Goodbye.";

/// Static orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Public base URL of this gateway, e.g. `https://gateway.example.com`
    pub callback_base_url: Url,
    pub telephony_sample_rate: u32,
    pub speech_sample_rate: u32,
    pub cognitive_services_endpoint: Option<String>,
    /// Caller id for outbound calls
    pub agent_phone_number: Option<String>,
    pub fallback_announcement: String,
    pub fallback_voice: Option<String>,
    pub speech_connect_timeout: Duration,
    /// Time a call may lose its media socket before it degrades
    pub media_grace: Duration,
    pub outbound_capacity: usize,
}

impl OrchestratorConfig {
    /// Accepts `host`, `host:port` or a full `http(s)://` URL.
    pub fn new(callback_uri_host: &str) -> CallResult<Self> {
        Ok(Self {
            callback_base_url: parse_callback_base(callback_uri_host)?,
            telephony_sample_rate: 24000,
            speech_sample_rate: 24000,
            cognitive_services_endpoint: None,
            agent_phone_number: None,
            fallback_announcement: DEFAULT_FALLBACK_ANNOUNCEMENT.to_string(),
            fallback_voice: None,
            speech_connect_timeout: Duration::from_secs(10),
            media_grace: Duration::from_secs(2),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        })
    }

    /// `{base}/api/callbacks/{correlation_id}`
    pub fn callback_uri(&self, correlation_id: &str) -> String {
        format!(
            "{}/api/callbacks/{}",
            self.callback_base_url.as_str().trim_end_matches('/'),
            correlation_id
        )
    }

    /// `wss://{host}/ws/{correlation_id}`
    pub fn media_uri(&self, correlation_id: &str) -> String {
        let host = self.callback_base_url.host_str().unwrap_or_default();
        match self.callback_base_url.port() {
            Some(port) => format!("wss://{host}:{port}/ws/{correlation_id}"),
            None => format!("wss://{host}/ws/{correlation_id}"),
        }
    }
}

fn parse_callback_base(value: &str) -> CallResult<Url> {
    let value = value.trim();
    let candidate = if value.contains("://") {
        value.to_string()
    } else {
        format!("https://{}", value.trim_end_matches('/'))
    };
    let url = Url::parse(&candidate)
        .map_err(|e| CallError::Configuration(format!("Invalid callback host '{value}': {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CallError::Configuration(format!(
            "Callback host '{value}' has no host"
        )));
    }
    Ok(url)
}

/// Identifiers returned when an outbound call is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundCallInfo {
    pub call_connection_id: String,
    pub correlation_id: String,
}

pub struct CallOrchestrator {
    config: OrchestratorConfig,
    telephony: Arc<dyn CallAutomation>,
    speech: Arc<SpeechSessionManager>,
    store: Arc<dyn SessionStore>,
    dedup: EventDeduplicator,
    registry: CallRegistry,
    signals: SignalSender,
}

impl std::fmt::Debug for CallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOrchestrator")
            .field("config", &self.config)
            .field("active_calls", &self.registry.len())
            .finish()
    }
}

impl CallOrchestrator {
    /// Create the orchestrator and start its control loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: OrchestratorConfig,
        telephony: Arc<dyn CallAutomation>,
        speech: Arc<SpeechSessionManager>,
        store: Arc<dyn SessionStore>,
        dedup: EventDeduplicator,
    ) -> Arc<Self> {
        let (signals, signal_rx) = signal_channel();
        let orchestrator = Arc::new(Self {
            config,
            telephony,
            speech,
            store,
            dedup,
            registry: CallRegistry::new(),
            signals,
        });
        tokio::spawn(run_control_loop(Arc::downgrade(&orchestrator), signal_rx));
        orchestrator
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn speech(&self) -> &SpeechSessionManager {
        &self.speech
    }

    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    /// Current state of a call by correlation id.
    pub async fn call_state(&self, correlation_id: &str) -> Option<CallState> {
        let entry = self.registry.get(correlation_id)?;
        let state = entry.lock().await.session.state();
        Some(state)
    }

    fn audio_format(&self) -> CallResult<AudioFormat> {
        AudioFormat::for_sample_rate(self.config.telephony_sample_rate).ok_or_else(|| {
            CallError::Configuration(format!(
                "Unsupported telephony sample rate {}",
                self.config.telephony_sample_rate
            ))
        })
    }

    fn call_intelligence(&self) -> Option<CallIntelligenceOptions> {
        self.config
            .cognitive_services_endpoint
            .as_ref()
            .map(|endpoint| CallIntelligenceOptions {
                cognitive_services_endpoint: endpoint.clone(),
            })
    }

    // =========================================================================
    // Call establishment
    // =========================================================================

    /// Skip redeliveries, then answer in the background.
    ///
    /// Returns `false` when the event was a duplicate. Never waits on the
    /// platform.
    pub async fn dispatch_incoming_call(self: &Arc<Self>, event: IncomingCallEvent) -> bool {
        if let Some(key) = event.dedup_key()
            && !self.dedup.check_and_mark(key).await
        {
            info!(key = %key, "Skipping redelivered incoming call");
            return false;
        }

        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.handle_incoming_call(event).await {
                error!("Failed to answer incoming call: {}", e);
            }
        });
        true
    }

    /// Answer an incoming call with bidirectional media streaming.
    ///
    /// Returns the correlation id. On failure the call entry is released.
    pub async fn handle_incoming_call(&self, event: IncomingCallEvent) -> CallResult<String> {
        let audio_format = self.audio_format()?;

        let mut session = CallSession::new(CallDirection::Inbound, event.caller.clone());
        session.platform_correlation_id = event.correlation_id.clone();
        session.apply(CallTrigger::IncomingCall)?;
        let correlation_id = session.correlation_id.clone();

        let entry = self.registry.insert(session);
        // Held across the answer so callbacks for this call wait for the call id.
        let mut guard = entry.lock().await;

        info!(
            correlation_id = %correlation_id,
            caller = ?event.caller,
            "Answering incoming call"
        );

        let request = AnswerCallRequest {
            incoming_call_context: event.incoming_call_context,
            callback_uri: self.config.callback_uri(&correlation_id),
            call_intelligence_options: self.call_intelligence(),
            media_streaming_options: MediaStreamingOptions::bidirectional(
                self.config.media_uri(&correlation_id),
                audio_format,
            ),
        };

        let props = match self.telephony.answer_call(&request).await {
            Ok(props) => props,
            Err(e) => {
                error!(correlation_id = %correlation_id, "Answer failed: {}", e);
                drop(guard);
                self.registry.remove(&correlation_id, None);
                return Err(e.into());
            }
        };

        self.bind_call_id(&mut guard, &props.call_connection_id).await;
        info!(
            correlation_id = %correlation_id,
            call_id = %props.call_connection_id,
            "Call answered"
        );
        Ok(correlation_id)
    }

    /// Place an outbound call from the configured agent number.
    pub async fn initiate_outbound_call(
        &self,
        target: &str,
        payload: Option<Value>,
        persona: Option<String>,
    ) -> CallResult<OutboundCallInfo> {
        let audio_format = self.audio_format()?;
        let source = self.config.agent_phone_number.clone().ok_or_else(|| {
            CallError::Configuration("Agent phone number is not configured".to_string())
        })?;

        let mut session = CallSession::new(CallDirection::Outbound, Some(target.to_string()));
        session.context_payload = payload.clone();
        session.persona = persona;
        session.apply(CallTrigger::OutboundCreated)?;
        let correlation_id = session.correlation_id.clone();

        let entry = self.registry.insert(session);
        let mut guard = entry.lock().await;

        info!(correlation_id = %correlation_id, target = %target, "Placing outbound call");

        let request = CreateCallRequest {
            targets: vec![CommunicationIdentifier::phone(target)],
            source_caller_id_number: Some(PhoneNumber { value: source }),
            callback_uri: self.config.callback_uri(&correlation_id),
            call_intelligence_options: self.call_intelligence(),
            media_streaming_options: MediaStreamingOptions::bidirectional(
                self.config.media_uri(&correlation_id),
                audio_format,
            ),
        };

        let props = match self.telephony.create_call(&request).await {
            Ok(props) => props,
            Err(e) => {
                error!(correlation_id = %correlation_id, "Create call failed: {}", e);
                drop(guard);
                self.registry.remove(&correlation_id, None);
                return Err(e.into());
            }
        };

        let call_id = props.call_connection_id;
        self.bind_call_id(&mut guard, &call_id).await;
        if let Some(payload) = &payload {
            match serde_json::to_string(payload) {
                Ok(json) => {
                    if let Err(e) = self.store.set(&keys::payload(&call_id), json).await {
                        warn!(call_id = %call_id, "Failed to store call payload: {}", e);
                    }
                }
                Err(e) => warn!(call_id = %call_id, "Failed to serialize call payload: {}", e),
            }
        }

        Ok(OutboundCallInfo {
            call_connection_id: call_id,
            correlation_id,
        })
    }

    async fn bind_call_id(&self, entry: &mut CallEntry, call_id: &str) {
        if entry.session.call_id.is_some() {
            return;
        }
        let correlation_id = entry.session.correlation_id.clone();
        if !self.registry.bind_call_id(call_id, &correlation_id) {
            warn!(call_id = %call_id, correlation_id = %correlation_id, "Call id already bound to another call");
            return;
        }
        entry.session.call_id = Some(call_id.to_string());

        if let Err(e) = self
            .store
            .set(&keys::call_id(&correlation_id), call_id.to_string())
            .await
        {
            warn!(call_id = %call_id, "Failed to store call id: {}", e);
        }
        if let Err(e) = self
            .store
            .set(&keys::correlation_id(call_id), correlation_id.clone())
            .await
        {
            warn!(call_id = %call_id, "Failed to store correlation id: {}", e);
        }
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// Apply a call-automation callback.
    ///
    /// `context_id` is the correlation id embedded in the callback URI; without
    /// it the call is found by `callConnectionId`.
    pub async fn handle_callback(
        self: &Arc<Self>,
        context_id: Option<&str>,
        event: CallbackEvent,
    ) -> CallResult<()> {
        let call_connection_id = event.data.call_connection_id.as_deref();
        let entry = context_id
            .and_then(|id| self.registry.get(id))
            .or_else(|| call_connection_id.and_then(|id| self.registry.find_by_call_id(id)))
            .ok_or_else(|| {
                CallError::NotFound(
                    context_id
                        .or(call_connection_id)
                        .unwrap_or("<unknown>")
                        .to_string(),
                )
            })?;

        let correlation_id = {
            let mut guard = entry.lock().await;
            if let Some(call_id) = call_connection_id {
                self.bind_call_id(&mut guard, call_id).await;
            }
            if guard.session.platform_correlation_id.is_none() {
                guard.session.platform_correlation_id = event.data.correlation_id.clone();
            }
            guard.session.correlation_id.clone()
        };

        let kind = event.kind();
        debug!(correlation_id = %correlation_id, event = ?kind, "Callback received");

        match kind {
            CallbackKind::CallConnected => self.on_call_connected(&entry).await,
            CallbackKind::MediaStreamingStarted => self.on_media_streaming_started(&entry).await,
            CallbackKind::MediaStreamingStopped => {
                info!(correlation_id = %correlation_id, "Media streaming stopped");
            }
            CallbackKind::MediaStreamingFailed => {
                let info = event.data.result_information.clone().unwrap_or_default();
                error!(
                    correlation_id = %correlation_id,
                    code = ?info.code,
                    sub_code = ?info.sub_code,
                    "Media streaming failed: {}",
                    info.message.as_deref().unwrap_or("no details")
                );
                let mut guard = entry.lock().await;
                self.degrade(&mut guard, "media streaming failed").await;
            }
            CallbackKind::CallDisconnected => {
                self.teardown(&correlation_id).await;
            }
            CallbackKind::PlayCompleted | CallbackKind::PlayFailed => {
                self.on_play_finished(&entry, &event).await;
            }
            CallbackKind::Other(name) => {
                debug!(correlation_id = %correlation_id, event = %name, "Ignoring callback");
            }
        }
        Ok(())
    }

    async fn on_call_connected(self: &Arc<Self>, entry: &SharedCallEntry) {
        let mut guard = entry.lock().await;
        if guard.session.state() != CallState::Answering {
            debug!(
                call_id = %guard.session.log_id(),
                state = %guard.session.state(),
                "Ignoring CallConnected"
            );
            return;
        }
        if let Err(e) = guard.session.apply(CallTrigger::CallConnected) {
            warn!(call_id = %guard.session.log_id(), "{}", e);
            return;
        }
        info!(call_id = %guard.session.log_id(), "Call connected");

        let Some(call_id) = guard.session.call_id.clone() else {
            error!(correlation_id = %guard.session.correlation_id, "Connected call has no call id");
            return;
        };

        let (relay, queue) = outbound_channel(
            call_id.clone(),
            self.config.speech_sample_rate,
            self.config.telephony_sample_rate,
            self.config.outbound_capacity,
        );
        guard.relay = Some(relay.clone());
        guard.outbound = Some(queue);
        guard.speech_pending = true;

        let correlation_id = guard.session.correlation_id.clone();
        let context = guard.session.context_payload.clone();
        let persona = guard.session.persona.clone();
        drop(guard);

        let this = self.clone();
        tokio::spawn(async move {
            this.establish_speech(correlation_id, call_id, context, persona, relay)
                .await;
        });
    }

    async fn establish_speech(
        &self,
        correlation_id: String,
        call_id: String,
        context: Option<Value>,
        persona: Option<String>,
        relay: Arc<crate::bridge::OutboundRelay>,
    ) {
        let result = tokio::time::timeout(
            self.config.speech_connect_timeout,
            self.speech.create_session(
                &call_id,
                context.as_ref(),
                persona.as_deref(),
                relay,
                self.signals.clone(),
            ),
        )
        .await;

        let Some(entry) = self.registry.get(&correlation_id) else {
            if matches!(result, Ok(Ok(_))) {
                self.speech.close_session(&call_id).await;
            }
            return;
        };
        let mut guard = entry.lock().await;
        guard.speech_pending = false;

        match result {
            Ok(Ok(session)) => {
                if guard.session.state().is_shutting_down() || guard.session.degraded {
                    drop(guard);
                    self.speech.close_session(&call_id).await;
                    return;
                }
                guard.speech = Some(session);
                self.enter_streaming(&mut guard);
            }
            Ok(Err(e)) => {
                error!(call_id = %call_id, "Speech session failed: {}", e);
                self.degrade(&mut guard, "speech session failed").await;
            }
            Err(_) => {
                error!(
                    call_id = %call_id,
                    timeout_secs = self.config.speech_connect_timeout.as_secs(),
                    "Speech session timed out"
                );
                self.degrade(&mut guard, "speech session timed out").await;
            }
        }
    }

    async fn on_media_streaming_started(&self, entry: &SharedCallEntry) {
        let mut guard = entry.lock().await;
        match guard.session.state() {
            CallState::Answering | CallState::Connected => {
                guard.streaming_pending = true;
                self.enter_streaming(&mut guard);
            }
            state => {
                debug!(call_id = %guard.session.log_id(), state = %state, "Ignoring MediaStreamingStarted");
            }
        }
    }

    /// Move a connected call to `Streaming` once the platform has started
    /// streaming and the speech session is up. A degraded call stays
    /// `Connected`.
    fn enter_streaming(&self, entry: &mut CallEntry) {
        if !entry.streaming_pending
            || entry.session.degraded
            || entry.session.state() != CallState::Connected
        {
            return;
        }
        if entry.speech.is_none() {
            debug!(call_id = %entry.session.log_id(), "Streaming waits for speech session");
            return;
        }
        if let Err(e) = entry.session.apply(CallTrigger::MediaStreamingStarted) {
            warn!(call_id = %entry.session.log_id(), "{}", e);
            return;
        }
        entry.streaming_pending = false;
        info!(call_id = %entry.session.log_id(), "Media streaming started");
        self.try_start_bridge(entry);
    }

    async fn on_play_finished(&self, entry: &SharedCallEntry, event: &CallbackEvent) {
        if event.data.operation_context.as_deref() != Some(FALLBACK_OPERATION_CONTEXT) {
            debug!("Play finished for another operation");
            return;
        }
        let call_id = entry.lock().await.session.call_id.clone();
        let Some(call_id) = call_id else {
            return;
        };
        info!(call_id = %call_id, "Fallback announcement finished, hanging up");
        if let Err(e) = self.telephony.hang_up(&call_id).await {
            warn!(call_id = %call_id, "Hang up failed: {}", e);
        }
    }

    // =========================================================================
    // Media
    // =========================================================================

    /// Hand the media WebSocket for a call to the orchestrator.
    ///
    /// The transport is closed if the call is unknown, ending, or already has
    /// one attached.
    pub async fn attach_media(
        &self,
        correlation_id: &str,
        transport: TelephonyTransport,
    ) -> CallResult<()> {
        let Some(entry) = self.registry.get(correlation_id) else {
            close_transport(correlation_id, transport).await;
            return Err(CallError::NotFound(correlation_id.to_string()));
        };

        let mut guard = entry.lock().await;
        let rejected = if guard.session.state().is_shutting_down() || guard.session.degraded {
            Some("call is not accepting media")
        } else if guard.media.is_some() || guard.bridge.is_some() {
            Some("media transport already attached")
        } else {
            None
        };
        if let Some(reason) = rejected {
            drop(guard);
            warn!(correlation_id = %correlation_id, "Rejecting media transport: {}", reason);
            close_transport(correlation_id, transport).await;
            return Err(CallError::InvalidInput(reason.to_string()));
        }

        info!(correlation_id = %correlation_id, "Media transport attached");
        guard.media = Some(transport);
        self.try_start_bridge(&mut guard);
        Ok(())
    }

    /// Start the bridge once streaming, media and speech are all in place.
    fn try_start_bridge(&self, entry: &mut CallEntry) {
        if entry.session.state() != CallState::Streaming
            || entry.session.degraded
            || entry.bridge.is_some()
        {
            return;
        }
        let Some(call_id) = entry.session.call_id.clone() else {
            return;
        };
        let Some(speech) = entry.speech.as_ref().map(|s| s.transport()) else {
            debug!(call_id = %call_id, "Bridge waiting for speech session");
            return;
        };
        if entry.media.is_none() || entry.outbound.is_none() {
            debug!(call_id = %call_id, "Bridge waiting for media transport");
            return;
        }
        let (Some(media), Some(queue)) = (entry.media.take(), entry.outbound.take()) else {
            return;
        };

        entry.bridge = Some(AudioBridge::start(
            BridgeConfig {
                call_id,
                telephony_rate: self.config.telephony_sample_rate,
                speech_rate: self.config.speech_sample_rate,
            },
            media,
            speech,
            queue,
            self.signals.clone(),
        ));
    }

    // =========================================================================
    // Degradation and teardown
    // =========================================================================

    async fn handle_signal(&self, signal: CallSignal) {
        let call_id = signal.call_id().to_string();
        let Some(entry) = self.registry.find_by_call_id(&call_id) else {
            debug!(call_id = %call_id, "Signal for unknown call");
            return;
        };
        let reason = match &signal {
            CallSignal::SpeechEnded { error: Some(e), .. } => format!("speech session error: {e}"),
            CallSignal::SpeechEnded { error: None, .. } => "speech session ended".to_string(),
            CallSignal::BridgeFailed { reason, .. } => format!("bridge failed: {reason}"),
            CallSignal::TransportClosed { .. } => {
                self.on_transport_closed(&call_id, &entry).await;
                return;
            }
        };
        let mut guard = entry.lock().await;
        self.degrade(&mut guard, &reason).await;
    }

    /// On an ordinary hang-up the media socket may close before
    /// `CallDisconnected` arrives. The bridge stops at once; the call degrades
    /// only if it is still up after the grace period.
    async fn on_transport_closed(&self, call_id: &str, entry: &SharedCallEntry) {
        {
            let mut guard = entry.lock().await;
            if guard.session.degraded || guard.session.state().is_shutting_down() {
                return;
            }
            if let Some(mut bridge) = guard.bridge.take() {
                bridge.shutdown().await;
            }
        }

        tokio::time::sleep(self.config.media_grace).await;

        let Some(entry) = self.registry.find_by_call_id(call_id) else {
            debug!(call_id = %call_id, "Call ended while media was closed");
            return;
        };
        let mut guard = entry.lock().await;
        self.degrade(&mut guard, "telephony transport closed").await;
    }

    /// Release bridge and speech, then play the fallback announcement.
    ///
    /// Runs at most once per call and never on a call that is ending.
    async fn degrade(&self, entry: &mut CallEntry, reason: &str) {
        if entry.session.degraded || entry.session.state().is_shutting_down() {
            return;
        }
        entry.session.degraded = true;
        warn!(
            call_id = %entry.session.log_id(),
            reason = %reason,
            "Degrading call to fallback announcement"
        );

        self.release_media(entry).await;

        let Some(call_id) = entry.session.call_id.clone() else {
            return;
        };
        let request = PlayTextRequest {
            text: self.config.fallback_announcement.clone(),
            voice_name: self.config.fallback_voice.clone(),
            operation_context: Some(FALLBACK_OPERATION_CONTEXT.to_string()),
        };
        if let Err(e) = self.telephony.play_text(&call_id, &request).await {
            error!(call_id = %call_id, "Fallback announcement failed: {}", e);
            if let Err(e) = self.telephony.hang_up(&call_id).await {
                warn!(call_id = %call_id, "Hang up failed: {}", e);
            }
        }
    }

    /// Stop the bridge before closing the speech session. Each resource is
    /// released at most once; failures are logged.
    async fn release_media(&self, entry: &mut CallEntry) {
        if let Some(mut bridge) = entry.bridge.take() {
            bridge.shutdown().await;
        }
        if let Some(media) = entry.media.take() {
            close_transport(&entry.session.correlation_id, media).await;
        }
        entry.outbound = None;
        if let Some(session) = entry.speech.take() {
            self.speech.close_session(session.call_id()).await;
        }
        entry.relay = None;
    }

    /// Tear a call down. Returns `false` if the call is unknown or already
    /// ending.
    pub async fn teardown(&self, correlation_id: &str) -> bool {
        let Some(entry) = self.registry.get(correlation_id) else {
            return false;
        };
        let mut guard = entry.lock().await;
        if guard.session.state().is_shutting_down() {
            return false;
        }
        if let Err(e) = guard.session.apply(CallTrigger::CallDisconnected) {
            warn!(correlation_id = %correlation_id, "{}", e);
            return false;
        }
        info!(call_id = %guard.session.log_id(), "Call disconnected, tearing down");

        self.release_media(&mut guard).await;

        let call_id = guard.session.call_id.clone();
        let mut evict = vec![keys::call_id(correlation_id)];
        if let Some(call_id) = &call_id {
            evict.push(keys::correlation_id(call_id));
            evict.push(keys::payload(call_id));
        }
        for key in evict {
            if let Err(e) = self.store.delete(&key).await {
                warn!(key = %key, "Failed to evict session cache entry: {}", e);
            }
        }

        if let Err(e) = guard.session.apply(CallTrigger::TeardownComplete) {
            warn!(correlation_id = %correlation_id, "{}", e);
        }
        drop(guard);
        self.registry.remove(correlation_id, call_id.as_deref());
        info!(correlation_id = %correlation_id, "Call ended");
        true
    }
}

async fn close_transport(correlation_id: &str, transport: TelephonyTransport) {
    if let Err(e) = transport.close().await {
        warn!(correlation_id = %correlation_id, "Failed to close media transport: {}", e);
    }
}

async fn run_control_loop(orchestrator: Weak<CallOrchestrator>, mut signals: SignalReceiver) {
    while let Some(signal) = signals.recv().await {
        let Some(orchestrator) = orchestrator.upgrade() else {
            break;
        };
        debug!(call_id = %signal.call_id(), signal = ?signal, "Call signal");
        tokio::spawn(async move {
            orchestrator.handle_signal(signal).await;
        });
    }
}
