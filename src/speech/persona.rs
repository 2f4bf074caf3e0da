//! Voice personas.
//!
//! A persona is the voice, turn-detection tuning and system prompt a speech
//! session is configured with. Prompts come from named templates; call-scoped
//! context (the payload that initiated the call) is appended to the template
//! under an `ADDITIONAL INFORMATION` heading.

use std::collections::HashMap;

use serde_json::Value;

use crate::core::realtime::messages::{
    EchoCancellation, NoiseReduction, PCM16_FORMAT, SessionConfig, TurnDetection, VoiceConfig,
};

pub const DEFAULT_PERSONA: &str = "default";
pub const DEFAULT_VOICE_NAME: &str = "en-US-Emma2:DragonHDLatestNeural";
pub const DEFAULT_VOICE_TYPE: &str = "azure-standard";
pub const DEFAULT_GREETING: &str = "Hello, thanks for calling. How can I help you today?";

const CONTEXT_HEADING: &str = "\n## ADDITIONAL INFORMATION\n";

const DEFAULT_TEMPLATE: &str = "## Objective
You are a friendly phone assistant. Speak naturally and keep every answer short enough to say in a few sentences.

## Language
- Plain spoken text only. No emojis, markup or lists.
- Spell out numbers the way a person would say them.
- Answer in the language the caller uses.

## Behaviour
- If you are interrupted, stop and listen, then pick up the unanswered question later.
- If you do not know something, say so and suggest who the caller could contact.";

const HEALTH_ADVISOR_TEMPLATE: &str = "## Objective
You are Emma, a warm and knowledgeable health advisor for laboratory and medical imaging services. Keep answers clear and no longer than five spoken sentences.

## Purpose
Help callers schedule lab or imaging appointments, explain common tests and scans, give clinic directions and explain how to prepare, for example fasting before a blood test.

## Language
- Plain spoken text only. No emojis, annotations or parentheses.
- Spell out numbers and measurements in full.
- Answer in the language the caller uses.

## Fallback
If you lack specific information, say you are not certain and suggest the clinic hotline.";

// =============================================================================
// Turn Detection
// =============================================================================

/// Turn detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnDetectionMode {
    ServerVad,
    #[default]
    AzureSemanticVad,
}

impl TurnDetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerVad => "server_vad",
            Self::AzureSemanticVad => "azure_semantic_vad",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "server_vad" | "server" => Self::ServerVad,
            "azure_semantic_vad" | "semantic" => Self::AzureSemanticVad,
            _ => Self::default(),
        }
    }
}

/// Turn detection tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnDetectionSettings {
    pub mode: TurnDetectionMode,
    /// Activation threshold (0.0 - 1.0)
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetectionSettings {
    fn default() -> Self {
        Self {
            mode: TurnDetectionMode::default(),
            threshold: 0.5,
            prefix_padding_ms: 200,
            silence_duration_ms: 200,
        }
    }
}

impl TurnDetectionSettings {
    fn to_wire(self) -> TurnDetection {
        match self.mode {
            TurnDetectionMode::ServerVad => TurnDetection::ServerVad {
                threshold: Some(self.threshold),
                prefix_padding_ms: Some(self.prefix_padding_ms),
                silence_duration_ms: Some(self.silence_duration_ms),
            },
            TurnDetectionMode::AzureSemanticVad => TurnDetection::AzureSemanticVad {
                threshold: Some(self.threshold),
                prefix_padding_ms: Some(self.prefix_padding_ms),
                silence_duration_ms: Some(self.silence_duration_ms),
                remove_filler_words: Some(false),
            },
        }
    }
}

// =============================================================================
// Persona
// =============================================================================

/// Voice persona applied to every speech session.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaConfig {
    /// Template used when a call does not name one
    pub template: String,
    pub voice_name: String,
    pub voice_type: String,
    pub voice_temperature: f32,
    pub turn_detection: TurnDetectionSettings,
    pub noise_suppression: bool,
    pub echo_cancellation: bool,
    /// Spoken by the assistant as soon as the session is configured
    pub greeting: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            template: DEFAULT_PERSONA.to_string(),
            voice_name: DEFAULT_VOICE_NAME.to_string(),
            voice_type: DEFAULT_VOICE_TYPE.to_string(),
            voice_temperature: 0.8,
            turn_detection: TurnDetectionSettings::default(),
            noise_suppression: true,
            echo_cancellation: true,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

impl PersonaConfig {
    /// Build the `session.update` payload.
    pub fn session_config(&self, instructions: String, input_sample_rate: u32) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["audio".to_string(), "text".to_string()]),
            instructions: Some(instructions),
            input_audio_format: Some(PCM16_FORMAT.to_string()),
            output_audio_format: Some(PCM16_FORMAT.to_string()),
            input_audio_sampling_rate: Some(input_sample_rate),
            turn_detection: Some(self.turn_detection.to_wire()),
            input_audio_noise_reduction: self
                .noise_suppression
                .then_some(NoiseReduction::AzureDeepNoiseSuppression),
            input_audio_echo_cancellation: self
                .echo_cancellation
                .then_some(EchoCancellation::ServerEchoCancellation),
            voice: Some(VoiceConfig {
                name: self.voice_name.clone(),
                voice_type: self.voice_type.clone(),
                temperature: Some(self.voice_temperature),
            }),
        }
    }
}

/// Named system prompt templates.
#[derive(Debug, Clone)]
pub struct PersonaCatalog {
    templates: HashMap<String, String>,
}

impl Default for PersonaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PersonaCatalog {
    /// The templates that ship with the gateway.
    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        templates.insert(DEFAULT_PERSONA.to_string(), DEFAULT_TEMPLATE.to_string());
        templates.insert(
            "health-advisor".to_string(),
            HEALTH_ADVISOR_TEMPLATE.to_string(),
        );
        Self { templates }
    }

    /// Built-in templates plus `extra`, which may override them.
    pub fn with_templates(extra: HashMap<String, String>) -> Self {
        let mut catalog = Self::builtin();
        catalog.templates.extend(extra);
        catalog
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.templates.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Render the system instructions for a call.
    ///
    /// Unknown template names fall back to the default template.
    pub fn instructions(&self, name: &str, context: Option<&Value>) -> String {
        let template = self
            .get(name)
            .or_else(|| self.get(DEFAULT_PERSONA))
            .unwrap_or(DEFAULT_TEMPLATE);

        match context {
            Some(context) if !context.is_null() => {
                let rendered = serde_json::to_string_pretty(context)
                    .unwrap_or_else(|_| context.to_string());
                format!("{template}{CONTEXT_HEADING}{rendered}")
            }
            _ => template.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_detection_mode_parsing() {
        assert_eq!(
            TurnDetectionMode::from_str_or_default("server_vad"),
            TurnDetectionMode::ServerVad
        );
        assert_eq!(
            TurnDetectionMode::from_str_or_default("AZURE_SEMANTIC_VAD"),
            TurnDetectionMode::AzureSemanticVad
        );
        assert_eq!(
            TurnDetectionMode::from_str_or_default("bogus"),
            TurnDetectionMode::AzureSemanticVad
        );
    }

    #[test]
    fn test_instructions_without_context() {
        let catalog = PersonaCatalog::builtin();
        let text = catalog.instructions(DEFAULT_PERSONA, None);
        assert_eq!(text, DEFAULT_TEMPLATE);
        assert!(!text.contains("ADDITIONAL INFORMATION"));
    }

    #[test]
    fn test_instructions_append_context() {
        let catalog = PersonaCatalog::builtin();
        let context = json!({"candidate_name": "Ada", "phone_number": "+14255550100"});
        let text = catalog.instructions("health-advisor", Some(&context));
        assert!(text.starts_with(HEALTH_ADVISOR_TEMPLATE));

        let (_, appended) = text.split_once("\n## ADDITIONAL INFORMATION\n").unwrap();
        let parsed: Value = serde_json::from_str(appended).unwrap();
        assert_eq!(parsed, context);
    }

    #[test]
    fn test_unknown_template_falls_back() {
        let catalog = PersonaCatalog::builtin();
        assert_eq!(catalog.instructions("nope", None), DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_custom_templates_override() {
        let mut extra = HashMap::new();
        extra.insert("default".to_string(), "Custom prompt".to_string());
        extra.insert("sales".to_string(), "Sell things".to_string());
        let catalog = PersonaCatalog::with_templates(extra);
        assert_eq!(catalog.get("default"), Some("Custom prompt"));
        assert_eq!(catalog.get("sales"), Some("Sell things"));
        assert!(catalog.contains("health-advisor"));
    }

    #[test]
    fn test_session_config_from_persona() {
        let mut persona = PersonaConfig::default();
        persona.echo_cancellation = false;
        let config = persona.session_config("Be nice".to_string(), 24000);

        assert_eq!(config.instructions.as_deref(), Some("Be nice"));
        assert_eq!(config.input_audio_sampling_rate, Some(24000));
        assert_eq!(
            config.input_audio_noise_reduction,
            Some(NoiseReduction::AzureDeepNoiseSuppression)
        );
        assert!(config.input_audio_echo_cancellation.is_none());
        match config.turn_detection {
            Some(TurnDetection::AzureSemanticVad {
                threshold,
                silence_duration_ms,
                ..
            }) => {
                assert_eq!(threshold, Some(0.5));
                assert_eq!(silence_duration_ms, Some(200));
            }
            other => panic!("Expected semantic VAD, got {:?}", other),
        }
        assert_eq!(config.voice.unwrap().name, DEFAULT_VOICE_NAME);
    }
}
