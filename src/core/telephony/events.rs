//! Webhook event models.
//!
//! Two kinds of deliveries reach the gateway:
//! - Event Grid notifications on `/api/incomingCall` (subscription handshake
//!   and incoming calls),
//! - call-automation callbacks on `/api/callbacks` (mid-call events).
//!
//! Both arrive as a JSON array; a single object is treated as a batch of one.
//! Array elements that do not parse are skipped so one bad element never
//! hides the rest of the delivery.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const SUBSCRIPTION_VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";
pub const INCOMING_CALL_EVENT: &str = "Microsoft.Communication.IncomingCall";

const COMMUNICATION_PREFIX: &str = "Microsoft.Communication.";

/// Errors while reading a webhook delivery.
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Event {event_type} is missing {field}")]
    MissingField {
        event_type: String,
        field: &'static str,
    },
}

fn parse_batch<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, EventParseError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| EventParseError::Json(e.to_string()))?;
    match value {
        Value::Array(elements) => Ok(elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| match serde_json::from_value(element) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, "Skipping malformed event in batch: {}", e);
                    None
                }
            })
            .collect()),
        value => serde_json::from_value(value)
            .map(|event| vec![event])
            .map_err(|e| EventParseError::Json(e.to_string())),
    }
}

// =============================================================================
// Event Grid
// =============================================================================

/// Event Grid envelope. Accepts both the Event Grid (`eventType`) and the
/// CloudEvents (`type`) schema.
#[derive(Debug, Clone, Deserialize)]
pub struct EventGridEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "eventType", alias = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

/// An incoming call notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCallEvent {
    pub event_id: Option<String>,
    pub incoming_call_context: String,
    /// Raw id of the calling party, e.g. `4:+14255550100`
    pub caller: Option<String>,
    pub server_call_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl IncomingCallEvent {
    /// Key used to recognise redeliveries of the same call.
    ///
    /// Prefers the server call id, then the platform correlation id, then the
    /// envelope id.
    pub fn dedup_key(&self) -> Option<&str> {
        self.server_call_id
            .as_deref()
            .or(self.correlation_id.as_deref())
            .or(self.event_id.as_deref())
    }
}

/// A classified Event Grid notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    SubscriptionValidation { validation_code: String },
    IncomingCall(IncomingCallEvent),
    Other(String),
}

fn str_field(data: &Value, field: &str) -> Option<String> {
    data.get(field).and_then(Value::as_str).map(str::to_string)
}

impl EventGridEvent {
    pub fn classify(&self) -> Result<GatewayEvent, EventParseError> {
        match self.event_type.as_str() {
            SUBSCRIPTION_VALIDATION_EVENT => {
                let validation_code = str_field(&self.data, "validationCode").ok_or_else(|| {
                    EventParseError::MissingField {
                        event_type: self.event_type.clone(),
                        field: "validationCode",
                    }
                })?;
                Ok(GatewayEvent::SubscriptionValidation { validation_code })
            }
            INCOMING_CALL_EVENT => {
                let incoming_call_context = str_field(&self.data, "incomingCallContext")
                    .ok_or_else(|| EventParseError::MissingField {
                        event_type: self.event_type.clone(),
                        field: "incomingCallContext",
                    })?;
                let caller = self
                    .data
                    .get("from")
                    .and_then(|from| from.get("rawId"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Ok(GatewayEvent::IncomingCall(IncomingCallEvent {
                    event_id: self.id.clone(),
                    incoming_call_context,
                    caller,
                    server_call_id: str_field(&self.data, "serverCallId"),
                    correlation_id: str_field(&self.data, "correlationId"),
                }))
            }
            other => Ok(GatewayEvent::Other(other.to_string())),
        }
    }
}

/// Parse an Event Grid delivery body.
pub fn parse_event_grid_batch(body: &[u8]) -> Result<Vec<EventGridEvent>, EventParseError> {
    parse_batch(body)
}

// =============================================================================
// Call Automation Callbacks
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultInformation {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub sub_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStreamingUpdate {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub media_streaming_status: Option<String>,
    #[serde(default)]
    pub media_streaming_status_details: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackData {
    #[serde(default)]
    pub call_connection_id: Option<String>,
    #[serde(default)]
    pub server_call_id: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub operation_context: Option<String>,
    #[serde(default)]
    pub result_information: Option<ResultInformation>,
    #[serde(default)]
    pub media_streaming_update: Option<MediaStreamingUpdate>,
}

/// A call-automation callback event.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", alias = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub data: CallbackData,
}

/// Callback kinds the state machine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackKind {
    CallConnected,
    MediaStreamingStarted,
    MediaStreamingStopped,
    MediaStreamingFailed,
    CallDisconnected,
    PlayCompleted,
    PlayFailed,
    Other(String),
}

impl CallbackEvent {
    pub fn kind(&self) -> CallbackKind {
        let name = self
            .event_type
            .strip_prefix(COMMUNICATION_PREFIX)
            .unwrap_or(&self.event_type);
        match name {
            "CallConnected" => CallbackKind::CallConnected,
            "MediaStreamingStarted" => CallbackKind::MediaStreamingStarted,
            "MediaStreamingStopped" => CallbackKind::MediaStreamingStopped,
            "MediaStreamingFailed" => CallbackKind::MediaStreamingFailed,
            "CallDisconnected" => CallbackKind::CallDisconnected,
            "PlayCompleted" => CallbackKind::PlayCompleted,
            "PlayFailed" => CallbackKind::PlayFailed,
            other => CallbackKind::Other(other.to_string()),
        }
    }
}

/// Parse a callback delivery body.
pub fn parse_callback_batch(body: &[u8]) -> Result<Vec<CallbackEvent>, EventParseError> {
    parse_batch(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_event() {
        let body = br#"[{"id":"1","eventType":"Microsoft.EventGrid.SubscriptionValidationEvent","data":{"validationCode":"abc-123"}}]"#;
        let events = parse_event_grid_batch(body).unwrap();
        assert_eq!(
            events[0].classify().unwrap(),
            GatewayEvent::SubscriptionValidation {
                validation_code: "abc-123".to_string()
            }
        );
    }

    #[test]
    fn test_incoming_call_event() {
        let body = br#"{"id":"evt-1","eventType":"Microsoft.Communication.IncomingCall","data":{
            "incomingCallContext":"ctx","serverCallId":"srv-1","correlationId":"corr-1",
            "from":{"kind":"phoneNumber","rawId":"4:+14255550100"}}}"#;
        let events = parse_event_grid_batch(body).unwrap();
        assert_eq!(events.len(), 1);
        match events[0].classify().unwrap() {
            GatewayEvent::IncomingCall(call) => {
                assert_eq!(call.incoming_call_context, "ctx");
                assert_eq!(call.caller.as_deref(), Some("4:+14255550100"));
                assert_eq!(call.dedup_key(), Some("srv-1"));
            }
            other => panic!("Expected IncomingCall, got {:?}", other),
        }
    }

    #[test]
    fn test_dedup_key_fallbacks() {
        let mut call = IncomingCallEvent {
            event_id: Some("evt".to_string()),
            incoming_call_context: "ctx".to_string(),
            caller: None,
            server_call_id: None,
            correlation_id: Some("corr".to_string()),
        };
        assert_eq!(call.dedup_key(), Some("corr"));
        call.correlation_id = None;
        assert_eq!(call.dedup_key(), Some("evt"));
        call.event_id = None;
        assert_eq!(call.dedup_key(), None);
    }

    #[test]
    fn test_incoming_call_missing_context() {
        let body = br#"[{"eventType":"Microsoft.Communication.IncomingCall","data":{}}]"#;
        let events = parse_event_grid_batch(body).unwrap();
        assert!(matches!(
            events[0].classify(),
            Err(EventParseError::MissingField {
                field: "incomingCallContext",
                ..
            })
        ));
    }

    #[test]
    fn test_malformed_body() {
        assert!(parse_event_grid_batch(b"not json").is_err());
        assert!(parse_event_grid_batch(b"{\"data\":{}}").is_err());
        assert!(parse_event_grid_batch(b"42").is_err());
        assert!(parse_event_grid_batch(b"[{\"data\":{}}]").unwrap().is_empty());
    }

    #[test]
    fn test_bad_element_does_not_drop_batch() {
        let body = br#"[
            {"id":"0","data":{"validationCode":"orphan"}},
            "not an event",
            {"id":"1","eventType":"Microsoft.EventGrid.SubscriptionValidationEvent","data":{"validationCode":"abc-123"}}
        ]"#;
        let events = parse_event_grid_batch(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].classify().unwrap(),
            GatewayEvent::SubscriptionValidation {
                validation_code: "abc-123".to_string()
            }
        );

        let body = br#"[{"data":{"callConnectionId":"C1"}},
            {"type":"Microsoft.Communication.CallDisconnected","data":{"callConnectionId":"C1"}}]"#;
        let events = parse_callback_batch(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), CallbackKind::CallDisconnected);
    }

    #[test]
    fn test_callback_kinds() {
        let body = br#"[
            {"type":"Microsoft.Communication.CallConnected","data":{"callConnectionId":"C1","correlationId":"p-1"}},
            {"type":"Microsoft.Communication.MediaStreamingFailed","data":{"callConnectionId":"C1",
                "resultInformation":{"code":500,"subCode":8581,"message":"failed"}}},
            {"type":"Microsoft.Communication.PlayCompleted","data":{"callConnectionId":"C1","operationContext":"fallback-announcement"}},
            {"type":"Microsoft.Communication.ParticipantsUpdated","data":{}}
        ]"#;
        let events = parse_callback_batch(body).unwrap();
        assert_eq!(events[0].kind(), CallbackKind::CallConnected);
        assert_eq!(events[0].data.call_connection_id.as_deref(), Some("C1"));
        assert_eq!(events[1].kind(), CallbackKind::MediaStreamingFailed);
        assert_eq!(
            events[1].data.result_information.as_ref().unwrap().sub_code,
            Some(8581)
        );
        assert_eq!(events[2].kind(), CallbackKind::PlayCompleted);
        assert_eq!(
            events[3].kind(),
            CallbackKind::Other("ParticipantsUpdated".to_string())
        );
    }
}
