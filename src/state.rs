//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::call::{CallError, CallOrchestrator, CallResult, EventDeduplicator, OrchestratorConfig};
use crate::config::ServerConfig;
use crate::core::realtime::{SpeechConnector, VoiceLiveConfig, VoiceLiveConnector};
use crate::core::store::{MemorySessionStore, SessionStore};
use crate::core::telephony::{AcsCallAutomationClient, CallAutomation};
use crate::speech::{PersonaCatalog, SpeechSessionManager};

/// State shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub config: ServerConfig,
    pub orchestrator: Arc<CallOrchestrator>,
}

impl AppState {
    /// Build the production services from configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn new(config: ServerConfig) -> CallResult<Arc<Self>> {
        let connection_string = required(&config.acs_connection_string, "ACS connection string")?;
        let telephony: Arc<dyn CallAutomation> = Arc::new(AcsCallAutomationClient::new(
            connection_string,
            config.acs_api_version.clone(),
        )?);

        let mut voice_live = VoiceLiveConfig::new(
            required(&config.voice_live_endpoint, "Voice Live endpoint")?,
            required(&config.voice_live_api_key, "Voice Live API key")?,
        );
        voice_live.model = config.voice_live_model.clone();
        voice_live.api_version = config.voice_live_api_version.clone();
        let connector: Arc<dyn SpeechConnector> = Arc::new(VoiceLiveConnector::new(voice_live)?);

        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::with_ttl(
            Duration::from_secs(config.cache_ttl_seconds),
        ));

        info!(
            telephony_sample_rate = config.telephony_sample_rate,
            speech_sample_rate = config.speech_sample_rate,
            persona = %config.persona.template,
            "Gateway services initialized"
        );

        Self::with_services(config, telephony, connector, store)
    }

    /// Build state around caller-supplied service implementations.
    pub fn with_services(
        config: ServerConfig,
        telephony: Arc<dyn CallAutomation>,
        connector: Arc<dyn SpeechConnector>,
        store: Arc<dyn SessionStore>,
    ) -> CallResult<Arc<Self>> {
        let catalog = PersonaCatalog::with_templates(config.personas.clone());
        let speech = Arc::new(SpeechSessionManager::new(
            connector,
            catalog,
            config.persona.clone(),
            config.speech_sample_rate,
        ));

        let dedup = EventDeduplicator::new(
            config.idempotency_scope,
            config.idempotency_capacity,
            Some(store.clone()),
        );

        let orchestrator = CallOrchestrator::new(
            orchestrator_config(&config)?,
            telephony,
            speech,
            store,
            dedup,
        );

        Ok(Arc::new(Self {
            config,
            orchestrator,
        }))
    }
}

/// Derive the orchestrator settings from server configuration.
pub fn orchestrator_config(config: &ServerConfig) -> CallResult<OrchestratorConfig> {
    let mut orchestrator = OrchestratorConfig::new(required(
        &config.callback_uri_host,
        "callback URI host",
    )?)?;
    orchestrator.telephony_sample_rate = config.telephony_sample_rate;
    orchestrator.speech_sample_rate = config.speech_sample_rate;
    orchestrator.cognitive_services_endpoint = config.cognitive_services_endpoint.clone();
    orchestrator.agent_phone_number = config.agent_phone_number.clone();
    orchestrator.fallback_announcement = config.fallback_announcement.clone();
    orchestrator.fallback_voice = config.fallback_voice.clone();
    orchestrator.speech_connect_timeout = Duration::from_secs(config.speech_connect_timeout_seconds);
    orchestrator.media_grace = Duration::from_millis(config.media_grace_ms);
    Ok(orchestrator)
}

fn required<'a>(value: &'a Option<String>, what: &str) -> CallResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CallError::Configuration(format!("{what} is not configured")))
}
