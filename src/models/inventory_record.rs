use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{StockStatus, generate_id};

/// Default re-check cadence for newly registered products.
pub const DEFAULT_CHECK_INTERVAL_HOURS: i64 = 2;

/// Monitoring metadata layered on top of a ProductSnapshot, keyed by the same
/// (product_id, platform) pair. Created on first successful extraction; never
/// deleted automatically (monitoring can be disabled, history is retained).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct InventoryRecord {
    pub id: String,
    pub product_id: String,
    pub platform: String,
    pub source_url: String,
    pub monitoring_enabled: bool,
    /// Price-drop alert threshold in minor units. Set once at registration,
    /// never overwritten by later extractions.
    pub alert_threshold_minor: i64,
    pub check_interval_hours: i64,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub current_price_minor: i64,
    pub current_stock_status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryRecord {
    pub product_id: String,
    pub platform: String,
    pub source_url: String,
    pub price_minor: i64,
    pub stock_status: StockStatus,
    pub check_interval_hours: Option<i64>,
}

impl InventoryRecord {
    pub fn new(new_record: NewInventoryRecord) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            product_id: new_record.product_id,
            platform: new_record.platform,
            source_url: new_record.source_url,
            monitoring_enabled: true,
            alert_threshold_minor: default_alert_threshold(new_record.price_minor),
            check_interval_hours: new_record
                .check_interval_hours
                .unwrap_or(DEFAULT_CHECK_INTERVAL_HOURS),
            last_checked_at: None,
            current_price_minor: new_record.price_minor,
            current_stock_status: new_record.stock_status,
            created_at: now,
            updated_at: now,
        }
    }

    /// A record is due when it has never been checked or its interval elapsed.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_checked_at {
            None => true,
            Some(checked) => now - checked >= chrono::Duration::hours(self.check_interval_hours),
        }
    }
}

/// 80% of the registration price, rounded to the nearest minor unit.
pub fn default_alert_threshold(price_minor: i64) -> i64 {
    (price_minor * 8 + 5) / 10
}
