//! Application configuration table (`app_configs`) and its seed rows.

use super::entity::{Column, EntityDefinitionError, EntityType, Row};
use serde_json::json;

pub const TABLE: &str = "app_configs";

const SEED: &[(&str, &str, &str)] = &[
    ("vat", "0.2", "Value-added tax rate"),
    (
        "app_commission_match",
        "0.05",
        "Percentage commission the app earns from each match",
    ),
    (
        "app_commission_cashgame",
        "0.075",
        "Percentage commission the app earns from each cash game",
    ),
    ("basic_match_fee", "2.50", "Basic fee for a match"),
    ("basic_cashgame_fee", "20", "Basic fee for a cash game"),
    (
        "basic_big_blind_increasing",
        "12",
        "Amount by which the big blind increases in the game",
    ),
    (
        "basic_starting_big_blind",
        "12",
        "Starting big blind amount in the game",
    ),
    ("minimum_point_earned", "40", "Minimum points winners can earn"),
];

/// `app_configs(key VARCHAR(30) PK, value VARCHAR(30) NOT NULL, description VARCHAR(100) UNIQUE)`.
pub fn entity_type() -> Result<EntityType, EntityDefinitionError> {
    EntityType::builder(TABLE)
        .column(Column::text("key", 30).primary_key())
        .column(Column::text("value", 30).not_null())
        .column(Column::text("description", 100).unique())
        .seed_rows(seed_rows())
        .build()
}

pub fn seed_rows() -> Vec<Row> {
    SEED.iter()
        .map(|(key, value, description)| {
            let mut row = Row::new();
            row.insert("key".to_string(), json!(key));
            row.insert("value".to_string(), json!(value));
            row.insert("description".to_string(), json!(description));
            row
        })
        .collect()
}
