//! Raw data-channel messages and their decoding to text.
//!
//! Transports hand over messages in whatever representation they have: a
//! string, an owned byte buffer, a view into a larger buffer, an envelope
//! wrapping one of those, or a nested stream of further messages. [`classify`]
//! sorts a message into a closed set of outcomes so the channel adapter never
//! has to guess at shapes itself.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use agentdeck_domain::{json_kind, SnapshotError};
use futures_util::Stream;
use serde_json::Value;

/// Byte-order mark, stripped from the front of decoded text
const BOM: char = '\u{feff}';

/// A stream of further messages exposed by a message itself
pub type MessageStream = Pin<Box<dyn Stream<Item = RawMessage> + Send + 'static>>;

/// An opaque unit delivered by the transport
pub enum RawMessage {
    /// UTF-8 text
    Text(String),
    /// An owned byte buffer
    Bytes(Vec<u8>),
    /// A window into a shared byte buffer
    View(ByteView),
    /// A wrapper carrying a payload and transport metadata
    Envelope(Envelope),
    /// A subscribable stream of further messages
    Stream(MessageStream),
    /// Already-structured data handed over by the transport
    Structured(Value),
}

impl RawMessage {
    /// Short name of the representation, used as a log field.
    pub fn shape(&self) -> &'static str {
        match self {
            RawMessage::Text(_) => "text",
            RawMessage::Bytes(_) => "bytes",
            RawMessage::View(_) => "byte_view",
            RawMessage::Envelope(_) => "envelope",
            RawMessage::Stream(_) => "stream",
            RawMessage::Structured(_) => "structured",
        }
    }

    /// Clone the message when its representation allows it; streams cannot be shared.
    pub fn try_clone(&self) -> Option<RawMessage> {
        Some(match self {
            RawMessage::Text(text) => RawMessage::Text(text.clone()),
            RawMessage::Bytes(bytes) => RawMessage::Bytes(bytes.clone()),
            RawMessage::View(view) => RawMessage::View(view.clone()),
            RawMessage::Envelope(envelope) => RawMessage::Envelope(envelope.try_clone()?),
            RawMessage::Stream(_) => return None,
            RawMessage::Structured(value) => RawMessage::Structured(value.clone()),
        })
    }

    /// Wrap in an envelope carrying a sequence number.
    pub fn sequenced(self, sequence: u64) -> RawMessage {
        RawMessage::Envelope(Envelope {
            sequence: Some(sequence),
            ..Envelope::wrap(self)
        })
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawMessage::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RawMessage::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RawMessage::View(view) => f.debug_tuple("View").field(view).finish(),
            RawMessage::Envelope(envelope) => f.debug_tuple("Envelope").field(envelope).finish(),
            RawMessage::Stream(_) => f.write_str("Stream(..)"),
            RawMessage::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
        }
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        RawMessage::Text(text)
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        RawMessage::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        RawMessage::Bytes(bytes)
    }
}

impl From<ByteView> for RawMessage {
    fn from(view: ByteView) -> Self {
        RawMessage::View(view)
    }
}

impl From<Envelope> for RawMessage {
    fn from(envelope: Envelope) -> Self {
        RawMessage::Envelope(envelope)
    }
}

/// A view over part of a shared buffer. Bounds are clamped to the buffer on construction.
#[derive(Clone)]
pub struct ByteView {
    buffer: Arc<[u8]>,
    offset: usize,
    len: usize,
}

impl ByteView {
    pub fn new(buffer: impl Into<Arc<[u8]>>, offset: usize, len: usize) -> Self {
        let buffer = buffer.into();
        let offset = offset.min(buffer.len());
        let len = len.min(buffer.len() - offset);
        Self {
            buffer,
            offset,
            len,
        }
    }

    /// A view spanning the whole buffer
    pub fn whole(buffer: impl Into<Arc<[u8]>>) -> Self {
        let buffer = buffer.into();
        let len = buffer.len();
        Self {
            buffer,
            offset: 0,
            len,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[self.offset..self.offset + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ByteView {{ offset: {}, len: {}, buffer_len: {} }}",
            self.offset,
            self.len,
            self.buffer.len()
        )
    }
}

/// A wrapper object carrying the actual payload plus transport metadata
#[derive(Default)]
pub struct Envelope {
    /// Topic the transport delivered this on, when it reports one
    pub topic: Option<String>,
    /// Producer sequence number, when the producer attaches one
    pub sequence: Option<u64>,
    pub payload: Option<Box<RawMessage>>,
    /// Further messages exposed by the envelope itself
    pub stream: Option<MessageStream>,
}

impl Envelope {
    pub fn wrap(payload: RawMessage) -> Self {
        Self {
            payload: Some(Box::new(payload)),
            ..Self::default()
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    fn try_clone(&self) -> Option<Envelope> {
        if self.stream.is_some() {
            return None;
        }
        let payload = match &self.payload {
            Some(payload) => Some(Box::new(payload.try_clone()?)),
            None => None,
        };
        Some(Envelope {
            topic: self.topic.clone(),
            sequence: self.sequence,
            payload,
            stream: None,
        })
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("topic", &self.topic)
            .field("sequence", &self.sequence)
            .field("payload", &self.payload)
            .field("stream", &self.stream.as_ref().map(|_| ".."))
            .finish()
    }
}

/// UTF-8 text with the byte-order mark and surrounding whitespace removed.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText(String);

impl DecodedText {
    /// Returns `None` when nothing but whitespace (and a BOM) remains.
    pub fn new(raw: &str) -> Option<Self> {
        let text = raw.trim_start().trim_start_matches(BOM).trim();
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DecodedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Decoded text plus the metadata that travelled with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    pub text: DecodedText,
    pub sequence: Option<u64>,
}

/// What the adapter should do with a message
pub enum Inbound {
    /// Attach to this stream and classify every message it emits
    Nested(MessageStream),
    /// Hand this text to the normalizer
    Text(InboundText),
    /// Nothing left after trimming; produce no update
    Empty,
}

impl fmt::Debug for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inbound::Nested(_) => f.write_str("Nested(..)"),
            Inbound::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Inbound::Empty => f.write_str("Empty"),
        }
    }
}

/// Classify a message by priority: nested stream, then envelope payload, then
/// the value itself.
pub fn classify(message: RawMessage) -> Result<Inbound, SnapshotError> {
    let (value, sequence) = match message {
        RawMessage::Stream(stream) => return Ok(Inbound::Nested(stream)),
        RawMessage::Envelope(Envelope {
            stream: Some(stream),
            ..
        }) => return Ok(Inbound::Nested(stream)),
        RawMessage::Envelope(Envelope {
            payload: Some(payload),
            sequence,
            ..
        }) => (*payload, sequence),
        RawMessage::Envelope(_) => {
            return Err(SnapshotError::unrecognized("envelope without payload"));
        }
        other => (other, None),
    };

    let text = decode_value(value)?;
    Ok(match DecodedText::new(&text) {
        Some(text) => Inbound::Text(InboundText { text, sequence }),
        None => Inbound::Empty,
    })
}

/// Decode an unwrapped value to text.
fn decode_value(value: RawMessage) -> Result<String, SnapshotError> {
    match value {
        RawMessage::Text(text) => Ok(text),
        RawMessage::Bytes(bytes) => Ok(utf8(&bytes)),
        RawMessage::View(view) => Ok(utf8(view.as_slice())),
        RawMessage::Structured(value) => Ok(decode_structured(value)),
        nested @ (RawMessage::Envelope(_) | RawMessage::Stream(_)) => Err(
            SnapshotError::unrecognized(format!("{} inside payload", nested.shape())),
        ),
    }
}

fn decode_structured(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Object(map) => match map.get("data").and_then(byte_array) {
            Some(bytes) => utf8(&bytes),
            None => {
                tracing::warn!(shape = "object", "Unrecognized payload shape, stringifying");
                Value::Object(map).to_string()
            }
        },
        other => {
            tracing::warn!(shape = json_kind(&other), "Unrecognized payload shape, stringifying");
            other.to_string()
        }
    }
}

/// Interpret a JSON array of integers in `0..=255` as bytes.
pub fn byte_array(value: &Value) -> Option<Vec<u8>> {
    let Value::Array(items) = value else {
        return None;
    };
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn utf8(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(err) => {
            tracing::debug!(error = %err, "Payload is not valid UTF-8, replacing invalid sequences");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"{"player":{"name":"X"}}"#;

    fn text_of(message: RawMessage) -> Option<String> {
        match classify(message).expect("classifiable") {
            Inbound::Text(inbound) => Some(inbound.text.into_string()),
            Inbound::Empty => None,
            Inbound::Nested(_) => panic!("unexpected nested stream"),
        }
    }

    #[test]
    fn every_representation_decodes_to_the_same_text() {
        let bytes = DOC.as_bytes().to_vec();
        let mut padded = b"xx".to_vec();
        padded.extend_from_slice(DOC.as_bytes());
        padded.extend_from_slice(b"yy");

        let representations = vec![
            RawMessage::from(DOC),
            RawMessage::from(bytes.clone()),
            RawMessage::View(ByteView::whole(bytes.clone())),
            RawMessage::View(ByteView::new(padded, 2, DOC.len())),
            RawMessage::Envelope(Envelope::wrap(RawMessage::from(DOC))),
            RawMessage::Envelope(Envelope::wrap(RawMessage::from(bytes.clone()))),
            RawMessage::Envelope(Envelope::wrap(RawMessage::View(ByteView::whole(bytes.clone())))),
            RawMessage::Structured(json!({"type": "Buffer", "data": bytes})),
            RawMessage::Structured(Value::String(DOC.to_string())),
        ];

        for message in representations {
            let shape = message.shape();
            assert_eq!(text_of(message).as_deref(), Some(DOC), "shape: {shape}");
        }
    }

    #[test]
    fn byte_order_mark_and_whitespace_are_stripped() {
        let marked = format!("\u{feff}{DOC}");
        assert_eq!(text_of(RawMessage::from(marked.as_str())).as_deref(), Some(DOC));

        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(format!("  {DOC}\n").as_bytes());
        assert_eq!(text_of(RawMessage::from(bytes)).as_deref(), Some(DOC));
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(text_of(RawMessage::from(" \n\t ")), None);
        assert_eq!(text_of(RawMessage::from("\u{feff}  ")), None);
        assert_eq!(text_of(RawMessage::from(Vec::<u8>::new())), None);
    }

    #[test]
    fn envelope_sequence_is_carried() {
        let message = RawMessage::from(DOC).sequenced(7);
        match classify(message).expect("classifiable") {
            Inbound::Text(inbound) => assert_eq!(inbound.sequence, Some(7)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn streams_take_priority_over_payload() {
        let stream: MessageStream = Box::pin(futures_util::stream::empty());
        let envelope = Envelope {
            payload: Some(Box::new(RawMessage::from(DOC))),
            stream: Some(stream),
            ..Envelope::default()
        };
        assert!(matches!(
            classify(RawMessage::Envelope(envelope)),
            Ok(Inbound::Nested(_))
        ));
    }

    #[test]
    fn unusable_shapes_are_rejected() {
        let err = classify(RawMessage::Envelope(Envelope::default())).expect_err("no payload");
        assert_eq!(err.kind(), "unrecognized_payload_shape");

        let inner = RawMessage::Envelope(Envelope::wrap(RawMessage::from(DOC)));
        let err = classify(RawMessage::Envelope(Envelope::wrap(inner))).expect_err("nested");
        assert_eq!(
            err,
            SnapshotError::unrecognized("envelope inside payload")
        );
    }

    #[test]
    fn structured_values_are_stringified_as_last_resort() {
        let text = text_of(RawMessage::Structured(json!({"player": {"name": "Y"}})));
        assert_eq!(text.as_deref(), Some(r#"{"player":{"name":"Y"}}"#));
        assert_eq!(text_of(RawMessage::Structured(json!(12))).as_deref(), Some("12"));
    }

    #[test]
    fn byte_views_clamp_out_of_range_bounds() {
        let view = ByteView::new(b"abc".to_vec(), 2, 10);
        assert_eq!(view.as_slice(), b"c");
        let view = ByteView::new(b"abc".to_vec(), 10, 1);
        assert!(view.is_empty());
    }

    #[test]
    fn streams_cannot_be_cloned() {
        let stream: MessageStream = Box::pin(futures_util::stream::empty());
        assert!(RawMessage::Stream(stream).try_clone().is_none());
        assert!(RawMessage::from(DOC).try_clone().is_some());
    }
}
