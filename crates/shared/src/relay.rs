//! Relay frame format
//!
//! A relay forwards data packets from the agent room to clients over a
//! WebSocket. Each frame is a JSON object:
//!
//! ```json
//! {"topic": "world_state", "payload": "{...}", "seq": 12}
//! ```
//!
//! `payload` may be a JSON string, an array of bytes, or any other JSON value;
//! `seq` (alias `sequence`) is optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::payload::{byte_array, Envelope, RawMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, alias = "sequence", skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl RelayFrame {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            seq: None,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Convert into the envelope the channel adapter classifies.
    pub fn into_message(self) -> RawMessage {
        RawMessage::Envelope(Envelope {
            topic: Some(self.topic),
            sequence: self.seq,
            payload: Some(Box::new(payload_message(self.payload))),
            stream: None,
        })
    }
}

/// Map a JSON payload onto the closest raw representation.
fn payload_message(payload: Value) -> RawMessage {
    match payload {
        Value::String(text) => RawMessage::Text(text),
        Value::Array(_) => match byte_array(&payload) {
            Some(bytes) => RawMessage::Bytes(bytes),
            None => RawMessage::Structured(payload),
        },
        other => RawMessage::Structured(other),
    }
}
