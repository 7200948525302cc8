//! Snapshot normalization
//!
//! Turns decoded text into a canonical, UI-ready snapshot or rejects it. The
//! normalizer is pure: identical text always yields an identical snapshot, and a
//! rejected message never produces a partial one.

mod fields;
pub mod quests;
pub mod shopping;
pub mod world;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::SnapshotError;

pub use fields::{json_kind, Record};

/// A canonical snapshot type that can be built from any JSON object.
///
/// Implementations never fail: every required field has a default, and unknown
/// fields are carried through untouched.
pub trait SnapshotSchema:
    Serialize + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
    /// Short label used in logs
    const KIND: &'static str;

    /// Build the canonical snapshot from a parsed top-level object.
    fn from_document(document: Record) -> Self;
}

/// Parse `text` as JSON and canonicalize it into `S`.
///
/// Fails with [`SnapshotError::MalformedPayload`] when the text is not JSON or the
/// top-level value is not an object.
pub fn normalize<S: SnapshotSchema>(text: &str) -> Result<S, SnapshotError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(document) => Ok(S::from_document(document)),
        other => Err(SnapshotError::malformed(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}
