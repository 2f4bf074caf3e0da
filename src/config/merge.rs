//! Merge YAML values over environment values and defaults.

use std::path::PathBuf;

use super::env::{flag, parse, var};
use super::yaml::{
    AnnouncementYaml, CacheYaml, IdempotencyYaml, PersonaYaml, SecurityYaml, ServerYaml,
    SpeechYaml, TelephonyYaml, TlsYaml, TurnDetectionYaml, YamlConfig,
};
use super::{ServerConfig, TlsConfig};
use crate::call::{DEFAULT_IDEMPOTENCY_CAPACITY, IdempotencyScope};
use crate::call::orchestrator::DEFAULT_FALLBACK_ANNOUNCEMENT;
use crate::core::realtime::voice_live::{DEFAULT_VOICE_LIVE_API_VERSION, DEFAULT_VOICE_LIVE_MODEL};
use crate::core::telephony::acs::DEFAULT_ACS_API_VERSION;
use crate::speech::{PersonaConfig, TurnDetectionMode};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;
pub const DEFAULT_SPEECH_CONNECT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_MEDIA_GRACE_MS: u64 = 2000;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_RATE_LIMIT_BURST_SIZE: u32 = 10;

type MergeResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Build a [`ServerConfig`] from an optional YAML document and the environment.
///
/// Each value is taken from YAML when present, then from the environment,
/// then from the default.
pub fn merge_config(yaml: Option<YamlConfig>) -> MergeResult<ServerConfig> {
    let yaml = yaml.unwrap_or_default();

    let server = yaml.server.unwrap_or_default();
    let telephony = yaml.telephony.unwrap_or_default();
    let speech = yaml.speech.unwrap_or_default();
    let announcement = yaml.announcement.unwrap_or_default();
    let idempotency = yaml.idempotency.unwrap_or_default();
    let cache = yaml.cache.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let (host, port, tls) = merge_server(server)?;
    let TelephonyYaml {
        connection_string,
        api_version,
        cognitive_services_endpoint,
        agent_phone_number,
        default_target_phone_number,
        callback_uri_host,
        sample_rate: telephony_sample_rate,
        media_grace_ms,
    } = telephony;
    let SpeechYaml {
        endpoint,
        api_key,
        model,
        api_version: speech_api_version,
        sample_rate: speech_sample_rate,
        connect_timeout_seconds,
    } = speech;

    Ok(ServerConfig {
        host,
        port,
        tls,

        acs_connection_string: connection_string.or_else(|| var("ACS_CONNECTION_STRING")),
        acs_api_version: api_version
            .or_else(|| var("ACS_API_VERSION"))
            .unwrap_or_else(|| DEFAULT_ACS_API_VERSION.to_string()),
        cognitive_services_endpoint: cognitive_services_endpoint
            .or_else(|| var("COGNITIVE_SERVICE_ENDPOINT")),
        agent_phone_number: agent_phone_number.or_else(|| var("AGENT_PHONE_NUMBER")),
        default_target_phone_number: default_target_phone_number.or_else(|| var("TARGET_PHONE_NUMBER")),
        callback_uri_host: callback_uri_host.or_else(|| var("CALLBACK_URI_HOST")),
        telephony_sample_rate: pick(telephony_sample_rate, "TELEPHONY_SAMPLE_RATE")?
            .unwrap_or(DEFAULT_SAMPLE_RATE),
        media_grace_ms: pick(media_grace_ms, "MEDIA_GRACE_MS")?.unwrap_or(DEFAULT_MEDIA_GRACE_MS),

        voice_live_endpoint: endpoint.or_else(|| var("AZURE_VOICE_LIVE_ENDPOINT")),
        voice_live_api_key: api_key.or_else(|| var("AZURE_VOICE_LIVE_API_KEY")),
        voice_live_model: model
            .or_else(|| var("AZURE_VOICE_LIVE_DEPLOYMENT"))
            .unwrap_or_else(|| DEFAULT_VOICE_LIVE_MODEL.to_string()),
        voice_live_api_version: speech_api_version
            .or_else(|| var("AZURE_VOICE_LIVE_API_VERSION"))
            .unwrap_or_else(|| DEFAULT_VOICE_LIVE_API_VERSION.to_string()),
        speech_sample_rate: pick(speech_sample_rate, "SPEECH_SAMPLE_RATE")?
            .unwrap_or(DEFAULT_SAMPLE_RATE),
        speech_connect_timeout_seconds: pick(
            connect_timeout_seconds,
            "SPEECH_CONNECT_TIMEOUT_SECONDS",
        )?
        .unwrap_or(DEFAULT_SPEECH_CONNECT_TIMEOUT_SECONDS),

        persona: merge_persona(yaml.persona.unwrap_or_default())?,
        personas: yaml.personas,

        fallback_announcement: merge_announcement_text(&announcement),
        fallback_voice: announcement.voice.or_else(|| var("FALLBACK_VOICE")),

        idempotency_scope: merge_scope(&idempotency),
        idempotency_capacity: pick(idempotency.capacity, "IDEMPOTENCY_CAPACITY")?
            .unwrap_or(DEFAULT_IDEMPOTENCY_CAPACITY),

        cache_ttl_seconds: merge_cache_ttl(cache)?,

        rate_limit_requests_per_second: pick(
            security.rate_limit_requests_per_second,
            "RATE_LIMIT_REQUESTS_PER_SECOND",
        )?,
        rate_limit_burst_size: pick(security.rate_limit_burst_size, "RATE_LIMIT_BURST_SIZE")?
            .unwrap_or(DEFAULT_RATE_LIMIT_BURST_SIZE),
    })
}

/// YAML value if set, otherwise the parsed environment variable.
fn pick<T>(yaml: Option<T>, name: &str) -> MergeResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match yaml {
        Some(value) => Ok(Some(value)),
        None => parse(name),
    }
}

fn pick_flag(yaml: Option<bool>, name: &str) -> MergeResult<Option<bool>> {
    match yaml {
        Some(value) => Ok(Some(value)),
        None => flag(name),
    }
}

fn merge_server(server: ServerYaml) -> MergeResult<(String, u16, Option<TlsConfig>)> {
    let host = server
        .host
        .or_else(|| var("HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = pick(server.port, "PORT")?.unwrap_or(DEFAULT_PORT);
    let tls = merge_tls(server.tls)?;
    Ok((host, port, tls))
}

fn merge_tls(tls: Option<TlsYaml>) -> MergeResult<Option<TlsConfig>> {
    let (cert_path, key_path) = match tls {
        Some(TlsYaml {
            enabled: Some(false),
            ..
        }) => return Ok(None),
        Some(tls) => (
            tls.cert_path.or_else(|| var("TLS_CERT_PATH")),
            tls.key_path.or_else(|| var("TLS_KEY_PATH")),
        ),
        None => (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")),
    };

    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("TLS requires both a certificate path and a key path".into()),
    }
}

fn merge_persona(persona: PersonaYaml) -> MergeResult<PersonaConfig> {
    let defaults = PersonaConfig::default();
    let turn = persona.turn_detection.unwrap_or_default();

    let mut merged = PersonaConfig {
        template: persona
            .template
            .or_else(|| var("PERSONA"))
            .unwrap_or(defaults.template),
        voice_name: persona
            .voice_name
            .or_else(|| var("VOICE_NAME"))
            .unwrap_or(defaults.voice_name),
        voice_type: persona
            .voice_type
            .or_else(|| var("VOICE_TYPE"))
            .unwrap_or(defaults.voice_type),
        voice_temperature: pick(persona.voice_temperature, "VOICE_TEMPERATURE")?
            .unwrap_or(defaults.voice_temperature),
        turn_detection: defaults.turn_detection,
        noise_suppression: pick_flag(persona.noise_suppression, "NOISE_SUPPRESSION")?
            .unwrap_or(defaults.noise_suppression),
        echo_cancellation: pick_flag(persona.echo_cancellation, "ECHO_CANCELLATION")?
            .unwrap_or(defaults.echo_cancellation),
        greeting: persona
            .greeting
            .or_else(|| var("GREETING_TEXT"))
            .unwrap_or(defaults.greeting),
    };
    merge_turn_detection(&mut merged, turn)?;
    Ok(merged)
}

fn merge_turn_detection(persona: &mut PersonaConfig, turn: TurnDetectionYaml) -> MergeResult<()> {
    let settings = &mut persona.turn_detection;
    if let Some(mode) = turn.mode.or_else(|| var("TURN_DETECTION_TYPE")) {
        settings.mode = TurnDetectionMode::from_str_or_default(&mode);
    }
    if let Some(threshold) = pick(turn.threshold, "TURN_DETECTION_THRESHOLD")? {
        settings.threshold = threshold;
    }
    if let Some(padding) = pick(turn.prefix_padding_ms, "TURN_DETECTION_PREFIX_PADDING_MS")? {
        settings.prefix_padding_ms = padding;
    }
    if let Some(silence) = pick(
        turn.silence_duration_ms,
        "TURN_DETECTION_SILENCE_DURATION_MS",
    )? {
        settings.silence_duration_ms = silence;
    }
    Ok(())
}

fn merge_announcement_text(announcement: &AnnouncementYaml) -> String {
    announcement
        .text
        .clone()
        .or_else(|| var("FALLBACK_ANNOUNCEMENT"))
        .unwrap_or_else(|| DEFAULT_FALLBACK_ANNOUNCEMENT.to_string())
}

fn merge_scope(idempotency: &IdempotencyYaml) -> IdempotencyScope {
    idempotency
        .scope
        .clone()
        .or_else(|| var("IDEMPOTENCY_SCOPE"))
        .map(|s| IdempotencyScope::from_str_or_default(&s))
        .unwrap_or_default()
}

fn merge_cache_ttl(cache: CacheYaml) -> MergeResult<u64> {
    Ok(pick(cache.ttl_seconds, "CACHE_TTL_SECONDS")?.unwrap_or(DEFAULT_CACHE_TTL_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::cleanup_env_vars;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_merge_defaults_without_sources() {
        cleanup_env_vars();

        let config = merge_config(None).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.tls.is_none());
        assert!(config.acs_connection_string.is_none());
        assert_eq!(config.fallback_announcement, DEFAULT_FALLBACK_ANNOUNCEMENT);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls_from_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/etc/cert.pem");
            env::set_var("TLS_KEY_PATH", "/etc/key.pem");
        }

        let config = merge_config(None).unwrap();
        let tls = config.tls.as_ref().unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/etc/cert.pem"));
        assert_eq!(tls.key_path, PathBuf::from("/etc/key.pem"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls_disabled_in_yaml() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/etc/cert.pem");
            env::set_var("TLS_KEY_PATH", "/etc/key.pem");
        }

        let yaml: YamlConfig = serde_yaml::from_str("server:\n  tls:\n    enabled: false\n").unwrap();
        let config = merge_config(Some(yaml)).unwrap();
        assert!(config.tls.is_none());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls_half_configured() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/etc/cert.pem");
        }

        let err = merge_config(None).unwrap_err();
        assert!(err.to_string().contains("key path"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_persona_yaml_over_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_NAME", "env-voice");
            env::set_var("GREETING_TEXT", "Hi from env");
            env::set_var("TURN_DETECTION_SILENCE_DURATION_MS", "800");
        }

        let yaml: YamlConfig = serde_yaml::from_str(
            "persona:\n  voice_name: yaml-voice\n  turn_detection:\n    threshold: 0.9\n",
        )
        .unwrap();
        let config = merge_config(Some(yaml)).unwrap();

        assert_eq!(config.persona.voice_name, "yaml-voice");
        assert_eq!(config.persona.greeting, "Hi from env");
        assert_eq!(config.persona.turn_detection.threshold, 0.9);
        assert_eq!(config.persona.turn_detection.silence_duration_ms, 800);

        cleanup_env_vars();
    }
}
