use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

use crate::models::{Condition, StockStatus};

/// Canonical normalized product record as of one extraction. One logical row
/// per (product_id, platform) pair; all writes are upserts on that pair.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ProductSnapshot {
    /// Platform-namespaced, e.g. "mercari_m12345678".
    pub product_id: String,
    pub platform: String,
    pub source_url: String,
    pub title: String,
    /// Integer minor currency units. Comparisons never go through floats.
    pub price_minor: i64,
    pub condition: Condition,
    pub stock_status: StockStatus,
    pub rarity: String,
    pub set_name: String,
    pub card_number: String,
    pub description: String,
    pub image_url: String,
    /// Platform-dependent extras (trading-card attributes etc.) as a JSON object.
    pub category_data_json: String,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductSnapshot {
    pub product_id: String,
    pub platform: String,
    pub source_url: String,
    pub title: String,
    pub price_minor: i64,
    pub condition: Condition,
    pub stock_status: StockStatus,
    pub rarity: String,
    pub set_name: String,
    pub card_number: String,
    pub description: String,
    pub image_url: String,
    pub category_data: BTreeMap<String, String>,
}

impl ProductSnapshot {
    pub fn new(new_snapshot: NewProductSnapshot) -> Self {
        Self {
            product_id: new_snapshot.product_id,
            platform: new_snapshot.platform,
            source_url: new_snapshot.source_url,
            title: new_snapshot.title,
            price_minor: new_snapshot.price_minor,
            condition: new_snapshot.condition,
            stock_status: new_snapshot.stock_status,
            rarity: new_snapshot.rarity,
            set_name: new_snapshot.set_name,
            card_number: new_snapshot.card_number,
            description: new_snapshot.description,
            image_url: new_snapshot.image_url,
            category_data_json: serde_json::to_string(&new_snapshot.category_data)
                .unwrap_or_else(|_| "{}".to_string()),
            scraped_at: Utc::now(),
        }
    }

    pub fn category_data(&self) -> BTreeMap<String, String> {
        serde_json::from_str(&self.category_data_json).unwrap_or_default()
    }
}
