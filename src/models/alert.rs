use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{AlertType, generate_id};

/// Created only when the monitor's alert predicate fires. Delivery is the
/// AlertSink's concern; this is the durable record of the decision.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Alert {
    pub id: String,
    pub inventory_id: String,
    pub alert_type: AlertType,
    pub message: String,
    pub change_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        inventory_id: String,
        alert_type: AlertType,
        message: String,
        change_event_id: Option<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            inventory_id,
            alert_type,
            message,
            change_event_id,
            created_at: Utc::now(),
        }
    }
}
