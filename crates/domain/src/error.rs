//! Error taxonomy for snapshot decoding
//!
//! Every variant is recoverable at the channel adapter boundary: the UI only
//! ever observes "no snapshot yet" or "last known good snapshot".

use thiserror::Error;

/// Failure to turn an inbound message into a snapshot
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Wire representation is not text, bytes, or an envelope
    #[error("Unrecognized payload shape: {shape}")]
    UnrecognizedPayloadShape { shape: String },

    /// Text was present but is not a JSON object
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Subscription could not be established on the transport
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),
}

impl SnapshotError {
    /// Create an unrecognized shape error
    pub fn unrecognized(shape: impl Into<String>) -> Self {
        Self::UnrecognizedPayloadShape {
            shape: shape.into(),
        }
    }

    /// Create a malformed payload error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPayload(msg.into())
    }

    /// Create a transport unavailable error
    pub fn transport_unavailable(msg: impl Into<String>) -> Self {
        Self::TransportUnavailable(msg.into())
    }

    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnrecognizedPayloadShape { .. } => "unrecognized_payload_shape",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::TransportUnavailable(_) => "transport_unavailable",
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_become_malformed_payload() {
        let err = serde_json::from_str::<serde_json::Value>("{not json")
            .map_err(SnapshotError::from)
            .expect_err("invalid json must fail");
        assert_eq!(err.kind(), "malformed_payload");
        assert!(err.to_string().starts_with("Malformed payload:"));
    }

    #[test]
    fn constructors_build_expected_variants() {
        assert_eq!(
            SnapshotError::unrecognized("number"),
            SnapshotError::UnrecognizedPayloadShape {
                shape: "number".into()
            }
        );
        assert_eq!(
            SnapshotError::transport_unavailable("offline").kind(),
            "transport_unavailable"
        );
    }
}
