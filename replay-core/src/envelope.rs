//! Outbound envelope construction and serialization.
//!
//! An envelope wraps one content fragment together with the correlation id of
//! the inbound event that produced it and a creation timestamp. Two wire
//! encodings are supported: a structured JSON form, and a raw form that
//! splices the fragment text in unquoted, byte-compatible with the captured
//! transcript this worker replays.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Placeholder payload used when a fragment is missing at the requested
/// position.
pub const EMPTY_PAYLOAD: &str = "{}";

/// Literal payload of the terminal envelope.
pub const END_PAYLOAD: &str = "END";

/// Wire encoding for outbound envelopes.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeFormat {
    /// Legacy textual splice: the payload text is embedded unquoted. Callers
    /// must ensure fragments are themselves valid JSON or accept non-JSON
    /// output.
    #[default]
    Raw,
    /// Structured JSON with the payload as a nested value.
    Structured,
}

/// Outbound message produced for one content fragment. Never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Creation time in milliseconds since Unix epoch.
    pub timestamp_ms: i64,
    /// Identifier of the inbound event this envelope answers.
    pub correlation_id: i64,
    /// Content fragment, or `None` when no fragment existed at this position.
    pub payload: Option<String>,
}

impl Envelope {
    /// Creates an envelope stamped with the current time.
    pub fn new(correlation_id: i64, payload: Option<String>) -> Self {
        Envelope {
            timestamp_ms: Utc::now().timestamp_millis(),
            correlation_id,
            payload,
        }
    }

    /// Serializes the envelope in the requested wire encoding.
    pub fn to_wire(&self, format: EnvelopeFormat) -> String {
        match format {
            EnvelopeFormat::Raw => self.to_raw(),
            EnvelopeFormat::Structured => self.to_structured().to_string(),
        }
    }

    /// Legacy encoding: `{ "timestamp": "<millis>", "id": "<id>", "payload": <raw> }`.
    fn to_raw(&self) -> String {
        let payload = self.payload.as_deref().unwrap_or(EMPTY_PAYLOAD);
        format!(
            "{{ \"timestamp\": \"{}\", \"id\": \"{}\", \"payload\": {} }}",
            self.timestamp_ms, self.correlation_id, payload
        )
    }

    /// Structured encoding with numeric fields. A fragment that parses as
    /// JSON is nested as a value; anything else is carried as a string.
    pub fn to_structured(&self) -> Value {
        let payload = match self.payload.as_deref() {
            None => json!({}),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(value) => value,
                Err(_) => Value::String(text.to_string()),
            },
        };
        json!({
            "timestamp": self.timestamp_ms,
            "id": self.correlation_id,
            "payload": payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(payload: Option<&str>) -> Envelope {
        Envelope {
            timestamp_ms: 1_700_000_000_123,
            correlation_id: 5,
            payload: payload.map(str::to_string),
        }
    }

    #[test]
    fn test_raw_encoding_splices_payload_unquoted() {
        let wire = envelope(Some(r#"{"a":1}"#)).to_wire(EnvelopeFormat::Raw);
        assert_eq!(
            wire,
            r#"{ "timestamp": "1700000000123", "id": "5", "payload": {"a":1} }"#
        );
    }

    #[test]
    fn test_raw_encoding_missing_payload_uses_placeholder() {
        let wire = envelope(None).to_wire(EnvelopeFormat::Raw);
        assert_eq!(
            wire,
            r#"{ "timestamp": "1700000000123", "id": "5", "payload": {} }"#
        );
    }

    #[test]
    fn test_raw_encoding_preserves_non_json_payload() {
        // Faithful splice behavior: the output is then not valid JSON.
        let wire = envelope(Some("not json")).to_wire(EnvelopeFormat::Raw);
        assert!(wire.contains(r#""payload": not json"#));
        assert!(serde_json::from_str::<Value>(&wire).is_err());
    }

    #[test]
    fn test_structured_encoding_nests_payload() {
        let wire = envelope(Some(r#"{"a":1}"#)).to_wire(EnvelopeFormat::Structured);
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["timestamp"], 1_700_000_000_123_i64);
        assert_eq!(value["id"], 5);
        assert_eq!(value["payload"]["a"], 1);
    }

    #[test]
    fn test_structured_encoding_wraps_non_json_payload() {
        let wire = envelope(Some("not json")).to_wire(EnvelopeFormat::Structured);
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["payload"], "not json");
    }

    #[test]
    fn test_structured_encoding_missing_payload() {
        let wire = envelope(None).to_wire(EnvelopeFormat::Structured);
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["payload"], json!({}));
    }

    #[test]
    fn test_format_default_is_raw() {
        assert_eq!(EnvelopeFormat::default(), EnvelopeFormat::Raw);
    }

    #[test]
    fn test_format_deserialization() {
        let format: EnvelopeFormat = serde_json::from_str("\"structured\"").unwrap();
        assert_eq!(format, EnvelopeFormat::Structured);
        let format: EnvelopeFormat = serde_json::from_str("\"raw\"").unwrap();
        assert_eq!(format, EnvelopeFormat::Raw);
    }
}
