use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// This structure represents the full configuration that can be loaded from a YAML file.
/// All fields are optional to allow partial configuration. Values present here take
/// precedence over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8000
///   tls:
///     enabled: true
///     cert_path: "/etc/gateway/cert.pem"
///     key_path: "/etc/gateway/key.pem"
///
/// telephony:
///   connection_string: "endpoint=https://my-acs.communication.azure.com/;accesskey=..."
///   api_version: "2024-09-15"
///   cognitive_services_endpoint: "https://my-speech.cognitiveservices.azure.com/"
///   agent_phone_number: "+14255550100"
///   default_target_phone_number: "+14255550199"
///   callback_uri_host: "https://gateway.example.com"
///   sample_rate: 24000
///   media_grace_ms: 2000
///
/// speech:
///   endpoint: "https://my-voice.cognitiveservices.azure.com"
///   api_key: "voice-live-key"
///   model: "gpt-4o-realtime-preview"
///   api_version: "2025-05-01-preview"
///   sample_rate: 24000
///   connect_timeout_seconds: 10
///
/// persona:
///   template: "health-advisor"
///   voice_name: "en-US-Emma2:DragonHDLatestNeural"
///   voice_type: "azure-standard"
///   voice_temperature: 0.8
///   greeting: "Hello, how can I help?"
///   noise_suppression: true
///   echo_cancellation: true
///   turn_detection:
///     type: "azure_semantic_vad"
///     threshold: 0.5
///     prefix_padding_ms: 200
///     silence_duration_ms: 200
///
/// personas:
///   concierge: "You are a hotel concierge."
///
/// announcement:
///   text: "We are having technical difficulties. Please call back later."
///   voice: "en-US-NancyNeural"
///
/// idempotency:
///   scope: "process"
///   capacity: 1024
///
/// cache:
///   ttl_seconds: 3600
///
/// security:
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub telephony: Option<TelephonyYaml>,
    pub speech: Option<SpeechYaml>,
    pub persona: Option<PersonaYaml>,
    /// Extra named prompt templates
    pub personas: HashMap<String, String>,
    pub announcement: Option<AnnouncementYaml>,
    pub idempotency: Option<IdempotencyYaml>,
    pub cache: Option<CacheYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Call Automation configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelephonyYaml {
    pub connection_string: Option<String>,
    pub api_version: Option<String>,
    pub cognitive_services_endpoint: Option<String>,
    pub agent_phone_number: Option<String>,
    pub default_target_phone_number: Option<String>,
    pub callback_uri_host: Option<String>,
    /// Media stream sample rate (16000 or 24000)
    pub sample_rate: Option<u32>,
    pub media_grace_ms: Option<u64>,
}

/// Voice Live configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeechYaml {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
    pub sample_rate: Option<u32>,
    pub connect_timeout_seconds: Option<u64>,
}

/// Persona configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersonaYaml {
    pub template: Option<String>,
    pub voice_name: Option<String>,
    pub voice_type: Option<String>,
    pub voice_temperature: Option<f32>,
    pub greeting: Option<String>,
    pub noise_suppression: Option<bool>,
    pub echo_cancellation: Option<bool>,
    pub turn_detection: Option<TurnDetectionYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TurnDetectionYaml {
    /// "server_vad" or "azure_semantic_vad"
    #[serde(rename = "type")]
    pub mode: Option<String>,
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Fallback announcement from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AnnouncementYaml {
    pub text: Option<String>,
    pub voice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IdempotencyYaml {
    /// "process" or "store"
    pub scope: Option<String>,
    pub capacity: Option<usize>,
}

/// Session cache configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYaml {
    pub ttl_seconds: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8080
  tls:
    enabled: true
    cert_path: "/tmp/cert.pem"
    key_path: "/tmp/key.pem"

telephony:
  connection_string: "endpoint=https://acs.example.com/;accesskey=a2V5"
  agent_phone_number: "+14255550100"
  callback_uri_host: "gateway.example.com"
  sample_rate: 16000
  media_grace_ms: 500

speech:
  endpoint: "https://voice.example.com"
  api_key: "vl-key"
  connect_timeout_seconds: 5

persona:
  template: "health-advisor"
  turn_detection:
    type: "server_vad"
    threshold: 0.6

personas:
  concierge: "You are a hotel concierge."

announcement:
  text: "Sorry, please call back."

idempotency:
  scope: "store"

security:
  rate_limit_requests_per_second: 20
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(server.port, Some(8080));
        assert_eq!(
            server.tls.as_ref().unwrap().cert_path.as_deref(),
            Some("/tmp/cert.pem")
        );

        let telephony = config.telephony.as_ref().unwrap();
        assert_eq!(telephony.agent_phone_number.as_deref(), Some("+14255550100"));
        assert_eq!(telephony.sample_rate, Some(16000));
        assert_eq!(telephony.media_grace_ms, Some(500));

        let speech = config.speech.as_ref().unwrap();
        assert_eq!(speech.api_key.as_deref(), Some("vl-key"));
        assert_eq!(speech.connect_timeout_seconds, Some(5));

        let persona = config.persona.as_ref().unwrap();
        let turn = persona.turn_detection.as_ref().unwrap();
        assert_eq!(turn.mode.as_deref(), Some("server_vad"));
        assert_eq!(turn.threshold, Some(0.6));

        assert_eq!(config.personas.len(), 1);
        assert_eq!(
            config.announcement.as_ref().unwrap().text.as_deref(),
            Some("Sorry, please call back.")
        );
        assert_eq!(
            config.idempotency.as_ref().unwrap().scope.as_deref(),
            Some("store")
        );
        assert_eq!(
            config
                .security
                .as_ref()
                .unwrap()
                .rate_limit_requests_per_second,
            Some(20)
        );
    }

    #[test]
    fn test_yaml_config_partial() {
        let yaml = r#"
server:
  port: 9000
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.server.as_ref().unwrap().port, Some(9000));
        assert!(config.server.as_ref().unwrap().host.is_none());
        assert!(config.telephony.is_none());
        assert!(config.personas.is_empty());
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("").unwrap_or_default();
        assert!(config.server.is_none());
        assert!(config.speech.is_none());
    }

    #[test]
    fn test_yaml_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "cache:\n  ttl_seconds: 60\n").unwrap();

        let config = YamlConfig::from_file(&path).unwrap();
        assert_eq!(config.cache.unwrap().ttl_seconds, Some(60));
    }

    #[test]
    fn test_yaml_wrong_type_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "server:\n  port: \"not a number\"\n").unwrap();

        let err = YamlConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }
}
