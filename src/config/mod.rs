//! Configuration module for the voice call gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_call_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::call::IdempotencyScope;
use crate::speech::PersonaConfig;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Call Automation settings (connection string, callback host, phone numbers)
/// - Voice Live settings (endpoint, key, model)
/// - Persona and fallback announcement
/// - Idempotency, cache and rate limiting
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Telephony
    /// `endpoint=https://...;accesskey=...`
    pub acs_connection_string: Option<String>,
    pub acs_api_version: String,
    /// Cognitive services endpoint used by the platform for text announcements
    pub cognitive_services_endpoint: Option<String>,
    /// Caller id for outbound calls (E.164)
    pub agent_phone_number: Option<String>,
    /// Target used when an outbound request names none (E.164)
    pub default_target_phone_number: Option<String>,
    /// Public host (or base URL) the platform calls back on
    pub callback_uri_host: Option<String>,
    pub telephony_sample_rate: u32,
    /// How long a call may sit without its media socket before it degrades
    pub media_grace_ms: u64,

    // Speech
    pub voice_live_endpoint: Option<String>,
    pub voice_live_api_key: Option<String>,
    pub voice_live_model: String,
    pub voice_live_api_version: String,
    pub speech_sample_rate: u32,
    pub speech_connect_timeout_seconds: u64,

    // Persona
    pub persona: PersonaConfig,
    /// Extra named prompt templates, merged over the built-in ones
    pub personas: HashMap<String, String>,

    // Fallback announcement
    pub fallback_announcement: String,
    pub fallback_voice: Option<String>,

    // Idempotency
    pub idempotency_scope: IdempotencyScope,
    pub idempotency_capacity: usize,

    // Session cache
    pub cache_ttl_seconds: u64,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: None (disabled)
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut connection_string) = self.acs_connection_string {
            connection_string.zeroize();
        }
        if let Some(ref mut key) = self.voice_live_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // Note: .env file is loaded in main.rs at application startup
        let yaml_config = yaml::YamlConfig::from_file(path)?;

        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;

        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    ///
    /// Returns true if TLS configuration is present
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limit_requests_per_second.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    pub(crate) fn cleanup_env_vars() {
        unsafe {
            for name in [
                "HOST",
                "PORT",
                "TLS_CERT_PATH",
                "TLS_KEY_PATH",
                "ACS_CONNECTION_STRING",
                "ACS_API_VERSION",
                "COGNITIVE_SERVICE_ENDPOINT",
                "AGENT_PHONE_NUMBER",
                "TARGET_PHONE_NUMBER",
                "CALLBACK_URI_HOST",
                "TELEPHONY_SAMPLE_RATE",
                "MEDIA_GRACE_MS",
                "AZURE_VOICE_LIVE_ENDPOINT",
                "AZURE_VOICE_LIVE_API_KEY",
                "AZURE_VOICE_LIVE_DEPLOYMENT",
                "AZURE_VOICE_LIVE_API_VERSION",
                "SPEECH_SAMPLE_RATE",
                "SPEECH_CONNECT_TIMEOUT_SECONDS",
                "PERSONA",
                "VOICE_NAME",
                "VOICE_TYPE",
                "VOICE_TEMPERATURE",
                "GREETING_TEXT",
                "TURN_DETECTION_TYPE",
                "TURN_DETECTION_THRESHOLD",
                "TURN_DETECTION_PREFIX_PADDING_MS",
                "TURN_DETECTION_SILENCE_DURATION_MS",
                "NOISE_SUPPRESSION",
                "ECHO_CANCELLATION",
                "FALLBACK_ANNOUNCEMENT",
                "FALLBACK_VOICE",
                "IDEMPOTENCY_SCOPE",
                "IDEMPOTENCY_CAPACITY",
                "CACHE_TTL_SECONDS",
                "RATE_LIMIT_REQUESTS_PER_SECOND",
                "RATE_LIMIT_BURST_SIZE",
            ] {
                env::remove_var(name);
            }
        }
    }

    /// Set the values that must be present for validation to pass.
    pub(crate) fn set_required_env_vars() {
        unsafe {
            env::set_var(
                "ACS_CONNECTION_STRING",
                "endpoint=https://acs.communication.azure.com/;accesskey=a2V5",
            );
            env::set_var("CALLBACK_URI_HOST", "https://gateway.example.com");
            env::set_var("AZURE_VOICE_LIVE_ENDPOINT", "https://voice.cognitiveservices.azure.com");
            env::set_var("AZURE_VOICE_LIVE_API_KEY", "env-voice-key");
        }
    }

    const REQUIRED_YAML: &str = r#"
telephony:
  connection_string: "endpoint=https://yaml.communication.azure.com/;accesskey=a2V5"
  callback_uri_host: "https://yaml.example.com"

speech:
  endpoint: "https://yaml-voice.cognitiveservices.azure.com"
  api_key: "yaml-voice-key"
"#;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();
        set_required_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.address(), "0.0.0.0:8000");
        assert!(!config.is_tls_enabled());
        assert_eq!(config.acs_api_version, "2024-09-15");
        assert_eq!(config.telephony_sample_rate, 24000);
        assert_eq!(config.media_grace_ms, 2000);
        assert_eq!(config.speech_sample_rate, 24000);
        assert_eq!(config.speech_connect_timeout_seconds, 10);
        assert_eq!(config.voice_live_model, "gpt-4o-realtime-preview");
        assert_eq!(config.voice_live_api_version, "2025-05-01-preview");
        assert_eq!(config.persona, PersonaConfig::default());
        assert_eq!(config.idempotency_scope, IdempotencyScope::Process);
        assert_eq!(config.idempotency_capacity, 1024);
        assert_eq!(config.cache_ttl_seconds, 3600);
        assert!(!config.is_rate_limited());
        assert_eq!(config.rate_limit_burst_size, 10);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        set_required_env_vars();
        unsafe {
            env::set_var("PORT", "9001");
            env::set_var("TELEPHONY_SAMPLE_RATE", "16000");
            env::set_var("TURN_DETECTION_TYPE", "server_vad");
            env::set_var("TURN_DETECTION_THRESHOLD", "0.7");
            env::set_var("NOISE_SUPPRESSION", "false");
            env::set_var("IDEMPOTENCY_SCOPE", "store");
            env::set_var("RATE_LIMIT_REQUESTS_PER_SECOND", "50");
            env::set_var("AGENT_PHONE_NUMBER", "+14255550100");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 9001);
        assert_eq!(config.telephony_sample_rate, 16000);
        assert_eq!(
            config.persona.turn_detection.mode,
            crate::speech::TurnDetectionMode::ServerVad
        );
        assert_eq!(config.persona.turn_detection.threshold, 0.7);
        assert!(!config.persona.noise_suppression);
        assert_eq!(config.idempotency_scope, IdempotencyScope::Store);
        assert_eq!(config.rate_limit_requests_per_second, Some(50));
        assert_eq!(config.agent_phone_number.as_deref(), Some("+14255550100"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_required() {
        cleanup_env_vars();

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ACS_CONNECTION_STRING"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();
        set_required_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = format!(
            r#"{REQUIRED_YAML}
server:
  host: "127.0.0.1"
  port: 8080

persona:
  template: "health-advisor"
  voice_name: "en-US-Ava:DragonHDLatestNeural"
  turn_detection:
    type: "server_vad"
    silence_duration_ms: 500

personas:
  concierge: "You are a hotel concierge."

idempotency:
  scope: "store"
  capacity: 64

cache:
  ttl_seconds: 7200
"#
        );

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.voice_live_api_key.as_deref(), Some("yaml-voice-key"));
        assert_eq!(config.persona.template, "health-advisor");
        assert_eq!(config.persona.voice_name, "en-US-Ava:DragonHDLatestNeural");
        assert_eq!(config.persona.turn_detection.silence_duration_ms, 500);
        assert_eq!(
            config.personas.get("concierge").map(String::as_str),
            Some("You are a hotel concierge.")
        );
        assert_eq!(config.idempotency_scope, IdempotencyScope::Store);
        assert_eq!(config.idempotency_capacity, 64);
        assert_eq!(config.cache_ttl_seconds, 7200);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        set_required_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"

speech:
  api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("PORT", "7000");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.voice_live_api_key.as_deref(), Some("yaml-key"));
        // ENV value
        assert_eq!(config.port, 7000);
        assert_eq!(
            config.callback_uri_host.as_deref(),
            Some("https://gateway.example.com")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_unsupported_sample_rate() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        let yaml_content = r#"
telephony:
  connection_string: "endpoint=https://yaml.communication.azure.com/;accesskey=a2V5"
  callback_uri_host: "https://yaml.example.com"
  sample_rate: 8000

speech:
  endpoint: "https://yaml-voice.cognitiveservices.azure.com"
  api_key: "yaml-voice-key"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("8000"));

        cleanup_env_vars();
    }
}
