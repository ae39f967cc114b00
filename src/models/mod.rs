use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod alert;
pub mod change_event;
pub mod inventory_record;
pub mod product_snapshot;

// Re-exports for convenience
pub use alert::*;
pub use change_event::*;
pub use inventory_record::*;
pub use product_snapshot::*;

// Common enums used across models

/// Canonical card condition, mapped from free-text marketplace labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum Condition {
    #[sqlx(rename = "mint")]
    Mint,
    #[sqlx(rename = "near_mint")]
    NearMint,
    #[sqlx(rename = "excellent")]
    Excellent,
    #[sqlx(rename = "good")]
    Good,
    #[sqlx(rename = "played")]
    Played,
    #[sqlx(rename = "used")]
    Used,
    #[sqlx(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum StockStatus {
    #[sqlx(rename = "in_stock")]
    InStock,
    #[sqlx(rename = "sold_out")]
    SoldOut,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum ChangeKind {
    #[sqlx(rename = "price_change")]
    PriceChange,
    #[sqlx(rename = "stock_change")]
    StockChange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT")]
pub enum AlertType {
    #[sqlx(rename = "price_drop")]
    PriceDrop,
    #[sqlx(rename = "stock_available")]
    StockAvailable,
}

// Helper function to generate UUIDs in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}
