use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{ChangeKind, generate_id};

/// Append-only audit trail: one row per re-check that detected any change,
/// written even when no alert fires.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ChangeEvent {
    pub id: String,
    pub inventory_id: String,
    pub kind: ChangeKind,
    pub old_value: String,
    pub new_value: String,
    pub checked_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(inventory_id: String, kind: ChangeKind, old_value: String, new_value: String) -> Self {
        Self {
            id: generate_id(),
            inventory_id,
            kind,
            old_value,
            new_value,
            checked_at: Utc::now(),
        }
    }
}
