use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// City and ISO country code the relay reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub city: String,
    pub country_code: String,
}

impl Location {
    pub fn new(city: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self { city: city.into(), country_code: country_code.into() }
    }

    /// Provider query form, e.g. `Sao Paulo,BR`.
    pub fn query(&self) -> String {
        format!("{},{}", self.city, self.country_code)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country_code)
    }
}

/// Normalized current conditions, built only from a successful provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// City name as resolved by the provider (may differ from the configured one).
    pub city: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub observed_at: DateTime<Utc>,
}

/// A snapshot together with the untouched provider payload it was built from.
#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub snapshot: WeatherSnapshot,
    pub raw: Value,
}

/// Event posted by the chat-automation platform.
///
/// Only the identifying fields are looked at; everything else rides along in `extra`.
/// Identifiers keep whatever JSON value the platform sent so they can be echoed as-is.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatEvent {
    /// Decodes a request body without ever rejecting it.
    ///
    /// Each identifier is picked out on its own; a body that is not a JSON
    /// object yields an empty event.
    pub fn from_body_lenient(body: &[u8]) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(body) else {
            return Self::default();
        };

        let event_type = fields.remove("eventType");
        let conversation_id = fields.remove("conversationId");
        let agent_id = fields.remove("agentId");
        let user_message = fields.remove("userMessage");

        Self { event_type, conversation_id, agent_id, user_message, extra: fields }
    }
}

/// Payload posted to the outbound webhook in poller mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundNotification {
    pub message: String,
}
