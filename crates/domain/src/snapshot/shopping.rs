//! Shopping state snapshot (commerce channel)

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};

use super::fields::{
    json_kind, take_id, take_integer_or, take_number, take_number_or, take_str, take_str_or,
    take_value, Record,
};
use super::SnapshotSchema;

/// Canonical shopping state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShoppingSnapshot {
    pub current_products: Vec<Product>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cart: Vec<CartLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_order: Option<Order>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A catalog product as shown to the shopper
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<String>>,
    pub stock: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A line the shopper intends to buy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A placed order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub items: Vec<OrderItem>,
    pub total: f64,
    pub currency: String,
    pub status: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One priced line of an [`Order`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub price: f64,
    pub item_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Order {
    /// Parse `created_at` as RFC 3339, falling back to a naive ISO-8601 timestamp.
    pub fn created_at_time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.created_at)
    }

    /// Sum of the line quantities
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

impl SnapshotSchema for ShoppingSnapshot {
    const KIND: &'static str = "shopping";

    fn from_document(mut document: Record) -> Self {
        let current_products = records_of(document.remove("current_products"), "product")
            .map(|(index, record)| product_from_record(record, index))
            .collect();
        let cart = records_of(document.remove("cart"), "cart line")
            .filter_map(|(_, record)| cart_line_from_record(record))
            .collect();
        let last_order = match document.remove("last_order") {
            Some(Value::Object(record)) => Some(order_from_record(record)),
            Some(Value::Null) | None => None,
            Some(other) => {
                tracing::debug!(kind = json_kind(&other), "Ignoring last_order of unexpected type");
                None
            }
        };

        Self {
            current_products,
            cart,
            last_order,
            extra: document,
        }
    }
}

/// Object entries of an array field with their source index; everything else is skipped.
fn records_of(raw: Option<Value>, what: &'static str) -> impl Iterator<Item = (usize, Record)> {
    let entries = match raw {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::debug!(kind = json_kind(&other), what, "Expected a list");
            Vec::new()
        }
    };
    entries.into_iter().enumerate().filter_map(move |(index, entry)| match entry {
        Value::Object(record) => Some((index, record)),
        other => {
            tracing::debug!(kind = json_kind(&other), what, "Skipping entry of unexpected type");
            None
        }
    })
}

fn product_from_record(mut record: Record, index: usize) -> Product {
    let id = take_id(&mut record, "id")
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| index.to_string());
    let sizes = match record.get("sizes") {
        Some(Value::Array(_)) => match record.remove("sizes") {
            Some(Value::Array(values)) => Some(
                values
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        },
        _ => None,
    };

    Product {
        id,
        name: take_str_or(&mut record, "name", ""),
        description: take_str_or(&mut record, "description", ""),
        price: take_number_or(&mut record, "price", 0.0),
        currency: take_str_or(&mut record, "currency", ""),
        category: take_str_or(&mut record, "category", ""),
        color: take_str(&mut record, "color"),
        sizes,
        stock: take_integer_or(&mut record, "stock", 0),
        extra: record,
    }
}

fn cart_line_from_record(mut record: Record) -> Option<CartLine> {
    let Some(product_id) = take_str(&mut record, "product_id") else {
        tracing::debug!("Skipping cart line without product_id");
        return None;
    };
    Some(CartLine {
        product_id,
        quantity: take_integer_or(&mut record, "quantity", 1),
        size: take_str(&mut record, "size"),
        extra: record,
    })
}

fn order_from_record(mut record: Record) -> Order {
    let items = records_of(record.remove("items"), "order item")
        .map(|(_, item)| order_item_from_record(item))
        .collect();

    Order {
        id: take_str_or(&mut record, "id", ""),
        items,
        total: take_number_or(&mut record, "total", 0.0),
        currency: take_str_or(&mut record, "currency", ""),
        status: take_str_or(&mut record, "status", ""),
        created_at: take_str_or(&mut record, "created_at", ""),
        updated_at: take_str(&mut record, "updated_at"),
        customer: take_value(&mut record, "customer"),
        extra: record,
    }
}

fn order_item_from_record(mut record: Record) -> OrderItem {
    let quantity = take_integer_or(&mut record, "quantity", 1);
    let price = take_number_or(&mut record, "price", 0.0);
    let item_total = take_number(&mut record, "item_total").unwrap_or(price * quantity as f64);
    // An unusable item_total is replaced by the computed one above
    record.remove("item_total");

    OrderItem {
        product_id: take_str_or(&mut record, "product_id", ""),
        product_name: take_str_or(&mut record, "product_name", ""),
        quantity,
        price,
        item_total,
        size: take_str(&mut record, "size"),
        extra: record,
    }
}
