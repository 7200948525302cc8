//! Quest log coercion
//!
//! Producers send quests in one of two shapes:
//! - bucketed: `{"active": [...], "completed": [...]}`
//! - named: `{"find_sword": {...}, "talk_to_elder": {...}}`
//!
//! Both are coerced into a [`QuestLog`] whose `active` and `completed` lists are disjoint.

use serde::Serialize;
use serde_json::{Map, Value};

use super::fields::{json_kind, take_id, take_str, take_str_strict, Record};

const ACTIVE: &str = "active";
const COMPLETED: &str = "completed";

/// A single quest entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quest {
    /// Never empty; falls back to the source key or bucket index
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining fields from the wire record, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Quest {
    /// Whether the status marks this quest as done
    pub fn is_completed(&self) -> bool {
        is_completed_status(self.status.as_deref())
    }
}

/// Canonical quest shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestLog {
    pub active: Vec<Quest>,
    pub completed: Vec<Quest>,
}

impl QuestLog {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.completed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.completed.len()
    }

    /// Route by status: `completed` (any case) goes to the completed list.
    fn route(&mut self, quest: Quest) {
        if quest.is_completed() {
            self.completed.push(quest);
        } else {
            self.active.push(quest);
        }
    }
}

fn is_completed_status(status: Option<&str>) -> bool {
    status.is_some_and(|s| s.eq_ignore_ascii_case(COMPLETED))
}

/// Coerce the raw `quests` field into a [`QuestLog`].
///
/// Missing, `null` or scalar values yield an empty log.
pub fn coerce_quests(raw: Option<Value>) -> QuestLog {
    match raw {
        Some(Value::Object(map)) => {
            if matches!(map.get(ACTIVE), Some(Value::Array(_))) {
                from_buckets(map)
            } else {
                from_named(map)
            }
        }
        Some(Value::Array(entries)) => {
            let mut log = QuestLog::default();
            for (index, entry) in entries.into_iter().enumerate() {
                if let Some(quest) = quest_from_entry(entry, index.to_string()) {
                    log.route(quest);
                }
            }
            log
        }
        Some(Value::Null) | None => QuestLog::default(),
        Some(other) => {
            tracing::debug!(kind = json_kind(&other), "Ignoring quests field of unexpected type");
            QuestLog::default()
        }
    }
}

/// Bucketed shape. Entries in `active` that report a completed status are moved;
/// entries in `completed` stay there.
fn from_buckets(mut map: Record) -> QuestLog {
    let mut log = QuestLog::default();

    if let Some(Value::Array(entries)) = map.remove(ACTIVE) {
        for (index, entry) in entries.into_iter().enumerate() {
            if let Some(quest) = quest_from_entry(entry, format!("{ACTIVE}-{index}")) {
                log.route(quest);
            }
        }
    }

    if let Some(Value::Array(entries)) = map.remove(COMPLETED) {
        for (index, entry) in entries.into_iter().enumerate() {
            if let Some(quest) = quest_from_entry(entry, format!("{COMPLETED}-{index}")) {
                log.completed.push(quest);
            }
        }
    }

    log
}

/// Named shape: one property per quest, keyed by quest id.
///
/// An empty key cannot serve as an id; such a quest keeps its own `id`, or
/// falls back to its title, name or position.
fn from_named(map: Record) -> QuestLog {
    let mut log = QuestLog::default();

    for (index, (key, value)) in map.into_iter().enumerate() {
        if key == ACTIVE || key == COMPLETED {
            continue;
        }
        let mut record = match value {
            Value::Object(record) => record,
            _ => Record::new(),
        };
        let quest = if key.is_empty() {
            let fallback = ["title", "name"]
                .iter()
                .find_map(|field| record.get(*field).and_then(Value::as_str))
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| index.to_string());
            quest_from_record(record, fallback)
        } else {
            // The property key is authoritative for named quests
            record.remove("id");
            quest_from_record(record, key)
        };
        log.route(quest);
    }

    log
}

fn quest_from_entry(entry: Value, fallback_id: String) -> Option<Quest> {
    match entry {
        Value::Object(record) => Some(quest_from_record(record, fallback_id)),
        Value::String(title) => Some(Quest {
            id: fallback_id,
            title,
            description: None,
            status: None,
            extra: Map::new(),
        }),
        other => {
            tracing::debug!(kind = json_kind(&other), "Skipping quest entry of unexpected type");
            None
        }
    }
}

fn quest_from_record(mut record: Record, fallback_id: String) -> Quest {
    let id = take_id(&mut record, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or(fallback_id);
    let title = take_str_strict(&mut record, "title")
        .or_else(|| record.get("name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| id.clone());
    let description = take_str(&mut record, "description");
    let status = take_str(&mut record, "status");

    Quest {
        id,
        title,
        description,
        status,
        extra: record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(quests: &[Quest]) -> Vec<&str> {
        quests.iter().map(|q| q.id.as_str()).collect()
    }

    #[test]
    fn named_quests_are_routed_by_status() {
        let log = coerce_quests(Some(json!({
            "find_sword": {"status": "completed"},
            "talk_to_elder": {}
        })));

        assert_eq!(log.active.len(), 1);
        assert_eq!(log.active[0].id, "talk_to_elder");
        assert_eq!(log.active[0].title, "talk_to_elder");
        assert_eq!(log.active[0].status, None);

        assert_eq!(log.completed.len(), 1);
        assert_eq!(log.completed[0].id, "find_sword");
        assert_eq!(log.completed[0].title, "find_sword");
        assert_eq!(log.completed[0].status.as_deref(), Some("completed"));
    }

    #[test]
    fn named_quest_title_prefers_title_then_name() {
        let log = coerce_quests(Some(json!({
            "a": {"title": "Alpha", "name": "ignored"},
            "b": {"name": "Bravo", "reward": 10},
            "c": "not an object"
        })));

        let by_id = |id: &str| log.active.iter().find(|q| q.id == id).cloned();
        assert_eq!(by_id("a").map(|q| q.title), Some("Alpha".into()));
        let b = by_id("b").expect("quest b");
        assert_eq!(b.title, "Bravo");
        assert_eq!(b.extra.get("name"), Some(&json!("Bravo")));
        assert_eq!(b.extra.get("reward"), Some(&json!(10)));
        assert_eq!(by_id("c").map(|q| q.title), Some("c".into()));
    }

    #[test]
    fn named_shape_skips_literal_bucket_keys_and_uses_key_as_id() {
        let log = coerce_quests(Some(json!({
            "active": {"not": "a list"},
            "completed": {},
            "hunt": {"id": "other", "status": "COMPLETED"}
        })));
        assert!(log.active.is_empty());
        assert_eq!(ids(&log.completed), vec!["hunt"]);
    }

    #[test]
    fn bucketed_quests_get_index_ids_and_disjoint_lists() {
        let log = coerce_quests(Some(json!({
            "active": [
                {"name": "Village Creatures", "status": "active"},
                {"id": "q2", "title": "Done already", "status": "Completed"},
                "Find the ferryman",
                42
            ],
            "completed": [{"title": "Prologue"}]
        })));

        assert_eq!(ids(&log.active), vec!["active-0", "active-2"]);
        assert_eq!(log.active[0].title, "Village Creatures");
        assert_eq!(log.active[1].title, "Find the ferryman");
        assert_eq!(ids(&log.completed), vec!["q2", "completed-0"]);
    }

    #[test]
    fn missing_or_scalar_quests_yield_empty_log() {
        assert!(coerce_quests(None).is_empty());
        assert!(coerce_quests(Some(Value::Null)).is_empty());
        assert!(coerce_quests(Some(json!("nope"))).is_empty());
    }

    #[test]
    fn empty_named_key_never_yields_an_empty_id() {
        let log = coerce_quests(Some(json!({
            "": {"title": "Nameless"},
            "hunt": {}
        })));
        assert_eq!(ids(&log.active), vec!["Nameless", "hunt"]);

        let log = coerce_quests(Some(json!({"": {}})));
        assert_eq!(ids(&log.active), vec!["0"]);

        let log = coerce_quests(Some(json!({"": {"id": "q9", "status": "completed"}})));
        assert_eq!(ids(&log.completed), vec!["q9"]);
    }

    #[test]
    fn numeric_ids_are_stringified_and_not_duplicated() {
        let log = coerce_quests(Some(json!({"active": [{"id": 7, "status": "completed"}]})));
        assert_eq!(ids(&log.completed), vec!["7"]);
        assert!(log.completed[0].extra.is_empty());

        let log = coerce_quests(Some(json!({"active": [{"id": true, "title": 3}]})));
        assert_eq!(ids(&log.active), vec!["active-0"]);
        assert_eq!(log.active[0].title, "active-0");
        assert!(log.active[0].extra.is_empty());
    }

    #[test]
    fn empty_id_falls_back_to_source_key() {
        let log = coerce_quests(Some(json!({"active": [{"id": ""}]})));
        assert_eq!(ids(&log.active), vec!["active-0"]);
        assert_eq!(log.active[0].title, "active-0");
    }
}
