//! Tolerant field extraction from loosely-typed JSON records.
//!
//! The `take_*` helpers remove a key from the record only when its value has the
//! expected type (or is `null`), so anything unexpected stays behind in the
//! record and is carried through as an extra field. The `take_*_or` helpers are
//! for fields with a default: the key is always consumed. A key whose canonical
//! field ends up populated never stays behind, otherwise it would be written
//! twice on serialization.

use serde_json::{Map, Value};

/// A JSON object being picked apart into a typed record.
pub type Record = Map<String, Value>;

/// Name of the JSON type of a value, for logs and error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn take_if(record: &mut Record, key: &str, accept: impl Fn(&Value) -> bool) -> Option<Value> {
    match record.get(key) {
        Some(Value::Null) => {
            record.remove(key);
            None
        }
        Some(value) if accept(value) => record.remove(key),
        _ => None,
    }
}

pub(crate) fn take_str(record: &mut Record, key: &str) -> Option<String> {
    match take_if(record, key, Value::is_string) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Like [`take_str`] but also consults `alias` when `key` is unusable.
pub(crate) fn take_str_aliased(record: &mut Record, key: &str, alias: &str) -> Option<String> {
    if let Some(value) = take_str(record, key) {
        return Some(value);
    }
    let aliased = take_str(record, alias);
    if aliased.is_some() {
        record.remove(key);
    }
    aliased
}

/// Removes the key whatever its type; yields it only when it is a string.
pub(crate) fn take_str_strict(record: &mut Record, key: &str) -> Option<String> {
    match record.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Removes an identifier. Numbers are stringified; other types are discarded.
pub(crate) fn take_id(record: &mut Record, key: &str) -> Option<String> {
    match record.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn take_str_or(record: &mut Record, key: &str, default: &str) -> String {
    match record.remove(key) {
        Some(Value::String(s)) => s,
        _ => default.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub(crate) fn take_number(record: &mut Record, key: &str) -> Option<f64> {
    take_if(record, key, |v| number_of(v).is_some()).and_then(|v| number_of(&v))
}

pub(crate) fn take_number_or(record: &mut Record, key: &str, default: f64) -> f64 {
    record
        .remove(key)
        .and_then(|v| number_of(&v))
        .unwrap_or(default)
}

pub(crate) fn take_integer(record: &mut Record, key: &str) -> Option<i64> {
    take_if(record, key, |v| integer_of(v).is_some()).and_then(|v| integer_of(&v))
}

/// Like [`take_integer`] but also consults `alias` when `key` is unusable.
pub(crate) fn take_integer_aliased(record: &mut Record, key: &str, alias: &str) -> Option<i64> {
    if let Some(value) = take_integer(record, key) {
        return Some(value);
    }
    let aliased = take_integer(record, alias);
    if aliased.is_some() {
        record.remove(key);
    }
    aliased
}

pub(crate) fn take_integer_or(record: &mut Record, key: &str, default: i64) -> i64 {
    record
        .remove(key)
        .and_then(|v| integer_of(&v))
        .unwrap_or(default)
}

pub(crate) fn take_bool(record: &mut Record, key: &str) -> Option<bool> {
    take_if(record, key, Value::is_boolean).and_then(|v| v.as_bool())
}

/// Removes an object-valued field; anything else is discarded and replaced by an empty map.
pub(crate) fn take_object_or_empty(record: &mut Record, key: &str) -> Record {
    match record.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Record::new(),
    }
}

/// Removes any non-null value.
pub(crate) fn take_value(record: &mut Record, key: &str) -> Option<Value> {
    match record.remove(key) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn mismatched_types_stay_in_record() {
        let mut r = record(json!({"status": 5, "name": "Rin"}));
        assert_eq!(take_str(&mut r, "status"), None);
        assert_eq!(take_str(&mut r, "name").as_deref(), Some("Rin"));
        assert_eq!(r.get("status"), Some(&json!(5)));
        assert!(!r.contains_key("name"));
    }

    #[test]
    fn nulls_are_consumed_as_absent() {
        let mut r = record(json!({"class": null}));
        assert_eq!(take_str(&mut r, "class"), None);
        assert!(r.is_empty());
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        let mut r = record(json!({"hp": " 42 ", "qty": "3", "weight": 2.5}));
        assert_eq!(take_number_or(&mut r, "hp", 0.0), 42.0);
        assert_eq!(take_integer(&mut r, "qty"), Some(3));
        assert_eq!(take_integer(&mut r, "weight"), None);
        assert_eq!(take_number(&mut r, "weight"), Some(2.5));
    }

    #[test]
    fn defaulted_fields_always_consume_the_key() {
        let mut r = record(json!({"hp": "lots", "status": ["x"]}));
        assert_eq!(take_number_or(&mut r, "hp", 0.0), 0.0);
        assert_eq!(take_str_or(&mut r, "status", "Unknown"), "Unknown");
        assert!(r.is_empty());
    }

    #[test]
    fn aliases_are_used_only_when_primary_is_missing() {
        let mut r = record(json!({"qty": 2, "desc": "sharp"}));
        assert_eq!(take_integer_aliased(&mut r, "quantity", "qty"), Some(2));
        assert_eq!(
            take_str_aliased(&mut r, "description", "desc").as_deref(),
            Some("sharp")
        );

        let mut r = record(json!({"quantity": 1, "qty": 9}));
        assert_eq!(take_integer_aliased(&mut r, "quantity", "qty"), Some(1));
        assert_eq!(r.get("qty"), Some(&json!(9)));
    }

    #[test]
    fn unusable_primary_is_dropped_when_alias_wins() {
        let mut r = record(json!({"quantity": "two", "qty": 2, "description": 5, "desc": "frayed"}));
        assert_eq!(take_integer_aliased(&mut r, "quantity", "qty"), Some(2));
        assert_eq!(
            take_str_aliased(&mut r, "description", "desc").as_deref(),
            Some("frayed")
        );
        assert!(r.is_empty());

        // Nothing usable: the mistyped primary stays as an extra
        let mut r = record(json!({"quantity": "two"}));
        assert_eq!(take_integer_aliased(&mut r, "quantity", "qty"), None);
        assert_eq!(r.get("quantity"), Some(&json!("two")));
    }

    #[test]
    fn ids_accept_numbers_and_always_consume_the_key() {
        let mut r = record(json!({"id": 7, "other": true, "name": ["x"]}));
        assert_eq!(take_id(&mut r, "id").as_deref(), Some("7"));
        assert_eq!(take_id(&mut r, "other"), None);
        assert_eq!(take_str_strict(&mut r, "name"), None);
        assert!(r.is_empty());
    }
}
