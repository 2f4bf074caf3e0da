//! Speech session lifecycle.
//!
//! One [`SpeechSession`] per call. Creating a session opens the speech
//! transport, configures it, waits for the endpoint to acknowledge and triggers
//! the greeting. A dispatch task then routes server events: audio to the
//! outbound relay, `speech_started` to barge-in. When the event stream ends on
//! its own the orchestrator is told through a [`CallSignal`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::persona::{PersonaCatalog, PersonaConfig};
use crate::bridge::relay::{OutboundRelay, PushOutcome};
use crate::call::signal::{CallSignal, SignalSender};
use crate::core::realtime::messages::{ConversationItem, ResponseConfig};
use crate::core::realtime::{
    ClientEvent, ConnectionState, RealtimeError, RealtimeResult, ServerEvent, SpeechConnector,
    SpeechTransport,
};

/// An open speech session for one call.
pub struct SpeechSession {
    call_id: String,
    persona: String,
    transport: Arc<dyn SpeechTransport>,
    session_id: Mutex<Option<String>>,
    state: Mutex<ConnectionState>,
    conversation_started: AtomicBool,
    closing: AtomicBool,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SpeechSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechSession")
            .field("call_id", &self.call_id)
            .field("persona", &self.persona)
            .field("session_id", &self.session_id())
            .field("state", &self.connection_state())
            .finish()
    }
}

impl SpeechSession {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    /// Persona template the session was configured with.
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Session id reported by `session.created`.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Whether the greeting has been requested.
    pub fn conversation_started(&self) -> bool {
        self.conversation_started.load(Ordering::SeqCst)
    }

    /// Sending half, for the audio bridge.
    pub fn transport(&self) -> Arc<dyn SpeechTransport> {
        self.transport.clone()
    }

    fn record_session_id(&self, id: Option<String>) {
        if let Some(id) = id {
            let mut current = self.session_id.lock();
            if current.is_none() {
                info!(call_id = %self.call_id, session_id = %id, "Speech session created");
                *current = Some(id);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.transport.close().await;
        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

/// Owns every speech session in the process.
pub struct SpeechSessionManager {
    connector: Arc<dyn SpeechConnector>,
    catalog: PersonaCatalog,
    persona: PersonaConfig,
    speech_sample_rate: u32,
    sessions: DashMap<String, Arc<SpeechSession>>,
}

impl SpeechSessionManager {
    pub fn new(
        connector: Arc<dyn SpeechConnector>,
        catalog: PersonaCatalog,
        persona: PersonaConfig,
        speech_sample_rate: u32,
    ) -> Self {
        Self {
            connector,
            catalog,
            persona,
            speech_sample_rate,
            sessions: DashMap::new(),
        }
    }

    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    pub fn speech_sample_rate(&self) -> u32 {
        self.speech_sample_rate
    }

    /// Open, configure and greet a speech session for `call_id`.
    ///
    /// `context` is the call's initiation payload, appended to the persona
    /// instructions. `persona` selects a named template; `None` uses the
    /// configured default.
    pub async fn create_session(
        &self,
        call_id: &str,
        context: Option<&Value>,
        persona: Option<&str>,
        relay: Arc<OutboundRelay>,
        signals: SignalSender,
    ) -> RealtimeResult<Arc<SpeechSession>> {
        if self.sessions.contains_key(call_id) {
            return Err(RealtimeError::SessionError(format!(
                "Speech session already exists for call {call_id}"
            )));
        }

        let persona = persona.unwrap_or(&self.persona.template).to_string();
        info!(call_id = %call_id, persona = %persona, "Opening speech session");

        let connection = self.connector.connect(call_id).await?;
        let transport = connection.transport;
        let mut events = connection.events;

        let session = Arc::new(SpeechSession {
            call_id: call_id.to_string(),
            persona: persona.clone(),
            transport: transport.clone(),
            session_id: Mutex::new(None),
            state: Mutex::new(ConnectionState::Connecting),
            conversation_started: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            dispatch: Mutex::new(None),
        });

        if let Err(e) = self.configure(&session, &persona, context, &mut events).await {
            session.set_state(ConnectionState::Failed);
            transport.close().await;
            return Err(e);
        }

        let inserted = match self.sessions.entry(call_id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                true
            }
        };
        if !inserted {
            transport.close().await;
            return Err(RealtimeError::SessionError(format!(
                "Speech session already exists for call {call_id}"
            )));
        }

        session.set_state(ConnectionState::Connected);
        let handle = tokio::spawn(run_dispatch(session.clone(), events, relay, signals));
        *session.dispatch.lock() = Some(handle);

        Ok(session)
    }

    /// Send `session.update`, wait for the endpoint to acknowledge, then
    /// trigger the greeting.
    async fn configure(
        &self,
        session: &SpeechSession,
        persona: &str,
        context: Option<&Value>,
        events: &mut mpsc::Receiver<ServerEvent>,
    ) -> RealtimeResult<()> {
        let instructions = self.catalog.instructions(persona, context);
        let config = self
            .persona
            .session_config(instructions, self.speech_sample_rate);
        session
            .transport
            .send(ClientEvent::SessionUpdate { session: config })
            .await?;

        loop {
            match events.recv().await {
                Some(ServerEvent::SessionCreated { session: info })
                | Some(ServerEvent::SessionUpdated { session: info }) => {
                    session.record_session_id(info.id);
                    break;
                }
                Some(ServerEvent::Error { error }) => {
                    return Err(RealtimeError::ProtocolError(error.message));
                }
                Some(other) => {
                    debug!(call_id = %session.call_id, event = other.event_type(), "Event before session acknowledgement");
                }
                None => {
                    return Err(RealtimeError::ConnectionFailed(
                        "Speech endpoint closed during session setup".to_string(),
                    ));
                }
            }
        }

        if !self.persona.greeting.is_empty() {
            session
                .transport
                .send(ClientEvent::ConversationItemCreate {
                    item: ConversationItem::assistant_text(self.persona.greeting.clone()),
                })
                .await?;
        }
        session
            .transport
            .send(ClientEvent::ResponseCreate {
                response: Some(ResponseConfig {
                    modalities: Some(vec!["audio".to_string(), "text".to_string()]),
                    instructions: None,
                }),
            })
            .await?;
        session.conversation_started.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Forward caller audio to the session for `call_id`.
    pub async fn append_audio(&self, call_id: &str, pcm: &[u8]) -> RealtimeResult<()> {
        let transport = self
            .sessions
            .get(call_id)
            .map(|s| s.transport.clone())
            .ok_or(RealtimeError::NotConnected)?;
        if !transport.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        transport.send(ClientEvent::audio_append(pcm)).await
    }

    /// Close the session for `call_id`. Returns `false` if there was none.
    pub async fn close_session(&self, call_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(call_id) else {
            return false;
        };
        session.close().await;
        info!(call_id = %call_id, "Speech session closed");
        true
    }

    pub fn session(&self, call_id: &str) -> Option<Arc<SpeechSession>> {
        self.sessions.get(call_id).map(|s| s.value().clone())
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

async fn run_dispatch(
    session: Arc<SpeechSession>,
    mut events: mpsc::Receiver<ServerEvent>,
    relay: Arc<OutboundRelay>,
    signals: SignalSender,
) {
    let call_id = session.call_id.clone();
    let mut fatal = None;

    while let Some(event) = events.recv().await {
        match event {
            ServerEvent::SessionCreated { session: info }
            | ServerEvent::SessionUpdated { session: info } => {
                session.record_session_id(info.id);
            }
            ServerEvent::ResponseAudioDelta { item_id, delta, .. } => {
                match ServerEvent::decode_audio_delta(&delta) {
                    Ok(pcm) => {
                        if relay.push_audio(&pcm, item_id.as_deref()) == PushOutcome::Closed {
                            debug!(call_id = %call_id, "Outbound relay closed, dropping audio");
                        }
                    }
                    Err(e) => warn!(call_id = %call_id, "Invalid audio delta: {}", e),
                }
            }
            ServerEvent::ResponseDone { .. } => {
                debug!(call_id = %call_id, "Response done");
            }
            ServerEvent::SpeechStarted { item_id, .. } => {
                info!(call_id = %call_id, item_id = ?item_id, "Caller started speaking");
                relay.barge_in();
            }
            ServerEvent::SpeechStopped { .. } => {
                debug!(call_id = %call_id, "Caller stopped speaking");
            }
            ServerEvent::Error { error: api_error } => {
                error!(
                    call_id = %call_id,
                    code = ?api_error.code,
                    "Speech session error: {}",
                    api_error.message
                );
                fatal = Some(api_error.message);
                break;
            }
            ServerEvent::Unknown => {
                debug!(call_id = %call_id, "Ignoring speech event");
            }
        }
    }

    session.set_state(ConnectionState::Disconnected);
    if !session.closing.load(Ordering::SeqCst) {
        info!(call_id = %call_id, "Speech session ended");
        let _ = signals.send(CallSignal::SpeechEnded {
            call_id,
            error: fatal,
        });
    }
}
