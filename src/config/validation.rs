//! Configuration validation.

use super::ServerConfig;
use crate::utils::validate_phone_number;

/// Sample rates both the media stream and the speech service accept.
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [16000, 24000];

/// Validate a merged configuration.
///
/// # Errors
/// Returns the first problem found:
/// - a required value is missing
/// - a sample rate is not 16000 or 24000
/// - a configured phone number is not E.164
/// - a numeric setting is zero where a positive value is needed
pub fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    require(&config.acs_connection_string, "ACS_CONNECTION_STRING")?;
    require(&config.callback_uri_host, "CALLBACK_URI_HOST")?;
    require(&config.voice_live_endpoint, "AZURE_VOICE_LIVE_ENDPOINT")?;
    require(&config.voice_live_api_key, "AZURE_VOICE_LIVE_API_KEY")?;

    validate_sample_rate(config.telephony_sample_rate, "telephony")?;
    validate_sample_rate(config.speech_sample_rate, "speech")?;

    for (number, name) in [
        (&config.agent_phone_number, "AGENT_PHONE_NUMBER"),
        (&config.default_target_phone_number, "TARGET_PHONE_NUMBER"),
    ] {
        if let Some(number) = number {
            validate_phone_number(number).map_err(|e| format!("{name}: {e}"))?;
        }
    }

    if config.speech_connect_timeout_seconds == 0 {
        return Err("Speech connect timeout must be at least 1 second".into());
    }
    if config.idempotency_capacity == 0 {
        return Err("Idempotency capacity must be greater than 0".into());
    }
    if config.rate_limit_requests_per_second == Some(0) {
        return Err("Rate limit must be greater than 0 requests per second".into());
    }

    Ok(())
}

fn require(value: &Option<String>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(format!("Missing required configuration: {name}").into()),
    }
}

fn validate_sample_rate(rate: u32, which: &str) -> Result<(), Box<dyn std::error::Error>> {
    if SUPPORTED_SAMPLE_RATES.contains(&rate) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported {which} sample rate {rate}; expected one of {SUPPORTED_SAMPLE_RATES:?}"
        )
        .into())
    }
}
