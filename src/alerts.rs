use async_trait::async_trait;
use tracing::info;

use crate::Result;
use crate::models::{Alert, AlertType};

/// Delivery backend for fired alerts. The monitor persists the Alert row
/// first and then hands it to the sink, so a failing sink never loses the
/// durable record.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, alert: &Alert) -> Result<()>;
}

/// Default sink: structured log line per alert. Useful on its own for
/// single-operator deployments and as the fallback when nothing else is
/// configured.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, alert: &Alert) -> Result<()> {
        let kind = match alert.alert_type {
            AlertType::PriceDrop => "price_drop",
            AlertType::StockAvailable => "stock_available",
        };
        info!(
            alert_id = %alert.id,
            inventory_id = %alert.inventory_id,
            alert_type = kind,
            "{}",
            alert.message
        );
        Ok(())
    }
}
