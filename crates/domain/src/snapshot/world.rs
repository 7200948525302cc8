//! World state snapshot (game-master channel)

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::fields::{
    json_kind, take_bool, take_integer_aliased, take_number, take_number_or, take_object_or_empty,
    take_str, take_str_aliased, take_str_or, take_value, Record,
};
use super::quests::{coerce_quests, QuestLog};
use super::SnapshotSchema;

pub const DEFAULT_PLAYER_NAME: &str = "Adventurer";
pub const DEFAULT_PLAYER_STATUS: &str = "Unknown";

/// Canonical world state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub player: Player,
    /// A non-mapping `npcs` value is kept verbatim in `extra`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub npcs: BTreeMap<String, NpcEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Value>,
    pub quests: QuestLog,
    /// Unrecognized top-level fields, passed through
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The player character, always fully populated
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub hp: f64,
    pub status: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub inventory: Vec<InventoryItem>,
    pub details: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            name: DEFAULT_PLAYER_NAME.to_string(),
            class: None,
            hp: 0.0,
            status: DEFAULT_PLAYER_STATUS.to_string(),
            attributes: BTreeMap::new(),
            inventory: Vec::new(),
            details: Map::new(),
            extra: Map::new(),
        }
    }
}

/// Attribute values are either numeric stats or free text
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

/// An inventory entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InventoryItem {
    fn named(name: String) -> Self {
        Self {
            name,
            quantity: None,
            description: None,
            durability: None,
            weight: None,
            value: None,
            extra: Map::new(),
        }
    }
}

/// An NPC record, keyed by name in [`WorldSnapshot::npcs`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Npc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An NPC as sent: a record, or any other value passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NpcEntry {
    Record(Npc),
    Raw(Value),
}

impl NpcEntry {
    pub fn as_record(&self) -> Option<&Npc> {
        match self {
            NpcEntry::Record(npc) => Some(npc),
            NpcEntry::Raw(_) => None,
        }
    }
}

impl SnapshotSchema for WorldSnapshot {
    const KIND: &'static str = "world";

    fn from_document(mut document: Record) -> Self {
        let player = match document.remove("player") {
            Some(Value::Object(record)) => player_from_record(record),
            _ => Player::default(),
        };
        let npcs = npcs_from_value(&mut document);
        let locations = take_value(&mut document, "locations");
        let events = take_value(&mut document, "events");
        let quests = coerce_quests(document.remove("quests"));

        Self {
            player,
            npcs,
            locations,
            events,
            quests,
            extra: document,
        }
    }
}

fn player_from_record(mut record: Record) -> Player {
    let name = take_str_or(&mut record, "name", DEFAULT_PLAYER_NAME);
    let class = take_str(&mut record, "class");
    let hp = take_number_or(&mut record, "hp", 0.0);
    let status = take_str_or(&mut record, "status", DEFAULT_PLAYER_STATUS);
    let attributes = attributes_from_record(take_object_or_empty(&mut record, "attributes"));
    let inventory = match record.remove("inventory") {
        Some(Value::Array(entries)) => entries.into_iter().filter_map(inventory_item).collect(),
        _ => Vec::new(),
    };
    let details = take_object_or_empty(&mut record, "details");

    Player {
        name,
        class,
        hp,
        status,
        attributes,
        inventory,
        details,
        extra: record,
    }
}

fn attributes_from_record(record: Record) -> BTreeMap<String, AttributeValue> {
    record
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::Number(n) => AttributeValue::Number(n.as_f64()?),
                Value::String(s) => AttributeValue::Text(s),
                other => AttributeValue::Text(other.to_string()),
            };
            Some((key, value))
        })
        .collect()
}

fn inventory_item(entry: Value) -> Option<InventoryItem> {
    let mut record = match entry {
        Value::Object(record) => record,
        Value::String(name) => return Some(InventoryItem::named(name)),
        other => {
            tracing::debug!(kind = json_kind(&other), "Skipping inventory entry of unexpected type");
            return None;
        }
    };

    let Some(name) = take_str(&mut record, "name") else {
        tracing::debug!("Skipping inventory entry without a name");
        return None;
    };

    Some(InventoryItem {
        name,
        quantity: take_integer_aliased(&mut record, "quantity", "qty"),
        description: take_str_aliased(&mut record, "description", "desc"),
        durability: take_number(&mut record, "durability"),
        weight: take_number(&mut record, "weight"),
        value: take_number(&mut record, "value"),
        extra: record,
    })
}

fn npcs_from_value(document: &mut Record) -> BTreeMap<String, NpcEntry> {
    match document.remove("npcs") {
        Some(Value::Object(map)) => map
            .into_iter()
            .map(|(name, value)| {
                let npc = match value {
                    Value::Object(record) => NpcEntry::Record(npc_from_record(record)),
                    other => NpcEntry::Raw(other),
                };
                (name, npc)
            })
            .collect(),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(other) => {
            tracing::debug!(kind = json_kind(&other), "npcs is not a mapping, passing it through");
            document.insert("npcs".to_string(), other);
            BTreeMap::new()
        }
    }
}

fn npc_from_record(mut record: Record) -> Npc {
    Npc {
        role: take_str(&mut record, "role"),
        attitude: take_str(&mut record, "attitude"),
        alive: take_bool(&mut record, "alive"),
        location: take_str(&mut record, "location"),
        description: take_str(&mut record, "description"),
        extra: record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::normalize;
    use serde_json::json;

    fn world(text: &str) -> WorldSnapshot {
        normalize::<WorldSnapshot>(text).expect("valid world snapshot")
    }

    #[test]
    fn player_is_defaulted_field_by_field() {
        let snapshot = world(r#"{"player": {"name": "Rin"}}"#);
        let player = &snapshot.player;
        assert_eq!(player.name, "Rin");
        assert_eq!(player.hp, 0.0);
        assert_eq!(player.status, "Unknown");
        assert!(player.inventory.is_empty());
        assert!(player.attributes.is_empty());
        assert!(player.details.is_empty());
        assert_eq!(player.class, None);
    }

    #[test]
    fn missing_player_gets_full_defaults() {
        let snapshot = world("{}");
        assert_eq!(snapshot.player, Player::default());
        assert_eq!(snapshot.player.name, "Adventurer");

        let snapshot = world(r#"{"player": null}"#);
        assert_eq!(snapshot.player, Player::default());
    }

    #[test]
    fn backend_inventory_aliases_are_canonicalized() {
        let snapshot = world(
            r#"{"player": {"inventory": [
                {"name": "Iron Sword", "qty": 1, "desc": "A sturdy blade", "durability": 100, "weight": 5, "value": 50},
                "Torch",
                {"qty": 3},
                7
            ]}}"#,
        );
        let inventory = &snapshot.player.inventory;
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].name, "Iron Sword");
        assert_eq!(inventory[0].quantity, Some(1));
        assert_eq!(inventory[0].description.as_deref(), Some("A sturdy blade"));
        assert_eq!(inventory[0].durability, Some(100.0));
        assert!(inventory[0].extra.is_empty());
        assert_eq!(inventory[1].name, "Torch");

        let encoded = serde_json::to_value(&inventory[0]).expect("serialize");
        assert_eq!(encoded["quantity"], json!(1));
        assert!(encoded.get("qty").is_none());
    }

    #[test]
    fn attributes_keep_numbers_and_text() {
        let snapshot = world(
            r#"{"player": {"attributes": {"Strength": 10, "Alignment": "Neutral", "Blessed": true, "Gone": null}}}"#,
        );
        let attributes = &snapshot.player.attributes;
        assert_eq!(attributes.get("Strength"), Some(&AttributeValue::Number(10.0)));
        assert_eq!(
            attributes.get("Alignment"),
            Some(&AttributeValue::Text("Neutral".into()))
        );
        assert_eq!(
            attributes.get("Blessed"),
            Some(&AttributeValue::Text("true".into()))
        );
        assert!(!attributes.contains_key("Gone"));
    }

    #[test]
    fn npcs_locations_and_events_pass_through() {
        let snapshot = world(
            r#"{
                "npcs": {"Mira": {"role": "innkeeper", "attitude": "friendly", "alive": true, "mood": "tired"}},
                "locations": {"village": {"paths": ["north_forest"]}},
                "events": ["quest_started"],
                "weather": "rain"
            }"#,
        );
        let mira = snapshot
            .npcs
            .get("Mira")
            .and_then(NpcEntry::as_record)
            .expect("npc");
        assert_eq!(mira.role.as_deref(), Some("innkeeper"));
        assert_eq!(mira.alive, Some(true));
        assert_eq!(mira.extra.get("mood"), Some(&json!("tired")));
        assert_eq!(
            snapshot.locations,
            Some(json!({"village": {"paths": ["north_forest"]}}))
        );
        assert_eq!(snapshot.events, Some(json!(["quest_started"])));
        assert_eq!(snapshot.extra.get("weather"), Some(&json!("rain")));
    }

    #[test]
    fn npcs_pass_through_without_deep_validation() {
        let snapshot = world(r#"{"npcs": {"Mira": "innkeeper, friendly", "Oren": null}}"#);
        assert_eq!(
            snapshot.npcs.get("Mira"),
            Some(&NpcEntry::Raw(json!("innkeeper, friendly")))
        );
        let encoded = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(encoded["npcs"]["Mira"], json!("innkeeper, friendly"));
        assert_eq!(encoded["npcs"]["Oren"], Value::Null);

        let snapshot = world(r#"{"npcs": ["Mira", "Oren"]}"#);
        assert!(snapshot.npcs.is_empty());
        let encoded = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(encoded["npcs"], json!(["Mira", "Oren"]));
    }

    #[test]
    fn mistyped_and_aliased_fields_survive_a_round_trip() {
        let text = r#"{
            "player": {"name": "Rin", "class": 3, "inventory": [
                {"name": "Rope", "quantity": "two", "qty": 2},
                {"name": "Lamp", "description": 5, "desc": "brass", "weight": "heavy"}
            ]},
            "npcs": {"Mira": "innkeeper", "Elder": {"alive": "maybe"}},
            "quests": {"active": [{"id": 7, "status": "completed"}, {"id": {}, "title": 1, "name": "Hunt"}]}
        }"#;

        let first = world(text);
        let rope = &first.player.inventory[0];
        assert_eq!(rope.quantity, Some(2));
        assert!(rope.extra.is_empty());
        assert_eq!(first.quests.completed[0].id, "7");

        let second = world(&serde_json::to_string(&first).expect("serialize"));
        assert_eq!(first, second);

        let npcs_only = world(r#"{"npcs": [1, 2]}"#);
        let again = world(&serde_json::to_string(&npcs_only).expect("serialize"));
        assert_eq!(npcs_only, again);
    }

    #[test]
    fn normalization_is_idempotent_for_backend_state() {
        let text = r#"{
            "player": {"name": "Adventurer", "class": "Wanderer", "hp": 100, "status": "Healthy",
                       "attributes": {"Strength": 10, "Intelligence": 10, "Luck": 10},
                       "inventory": [{"name": "Rope", "qty": 2}], "level": 3},
            "npcs": {"Elder": {"role": "elder", "attitude": "wary", "alive": true}},
            "locations": {"village": {"description": "A small farming village"}},
            "events": [],
            "quests": {"talk_to_elder": {}, "find_sword": {"status": "completed", "name": "Sword"}}
        }"#;

        let first = world(text);
        let reencoded = serde_json::to_string(&first).expect("serialize");
        let second = world(&reencoded);
        assert_eq!(first, second);
    }
}
