use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::Result;
use crate::alerts::AlertSink;
use crate::extractor::Extractor;
use crate::models::{Alert, AlertType, ChangeEvent, ChangeKind, InventoryRecord, StockStatus};
use crate::platforms::PlatformRegistry;
use crate::storage::Store;

/// Pause between items in a batch so a batch full of same-host records does
/// not hammer one marketplace.
pub const ITEM_DELAY: Duration = Duration::from_millis(500);

/// Per-record result of a monitoring check. Failures are data, not errors:
/// one bad record must never abort the rest of a batch.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub inventory_id: String,
    pub product_id: String,
    pub platform: String,
    pub success: bool,
    pub price_changed: bool,
    pub stock_changed: bool,
    pub alert: Option<AlertType>,
    pub error: Option<String>,
}

impl CheckOutcome {
    fn failure(record: &InventoryRecord, error: String) -> Self {
        Self {
            inventory_id: record.id.clone(),
            product_id: record.product_id.clone(),
            platform: record.platform.clone(),
            success: false,
            price_changed: false,
            stock_changed: false,
            alert: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub checked: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub alerts_fired: usize,
    /// True when the deadline expired before every due record was checked.
    pub cancelled: bool,
    pub results: Vec<CheckOutcome>,
}

/// Walks due inventory records, re-extracts each one, records deltas against
/// the stored state and fires alerts through the configured sink.
pub struct InventoryMonitor {
    store: Arc<Store>,
    registry: Arc<PlatformRegistry>,
    extractor: Arc<Extractor>,
    sink: Arc<dyn AlertSink>,
    item_delay: Duration,
}

impl InventoryMonitor {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<PlatformRegistry>,
        extractor: Arc<Extractor>,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            store,
            registry,
            extractor,
            sink,
            item_delay: ITEM_DELAY,
        }
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Re-checks one record. Never returns an error; a failed check leaves
    /// last_checked_at untouched so the record stays at the front of the
    /// stale queue.
    pub async fn check_one(&self, record: &InventoryRecord) -> CheckOutcome {
        let Some(profile) = self.registry.get(&record.platform) else {
            warn!(inventory_id = %record.id, platform = %record.platform, "unknown platform");
            return CheckOutcome::failure(
                record,
                format!("unknown platform: {}", record.platform),
            );
        };

        let extraction = match self.extractor.recheck(profile, &record.source_url).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(inventory_id = %record.id, url = %record.source_url, error = %e, "check failed");
                return CheckOutcome::failure(record, e.to_string());
            }
        };

        let new_price = extraction.snapshot.price_minor;
        let new_stock = extraction.snapshot.stock_status;
        let price_changed = new_price != record.current_price_minor;
        let stock_changed = new_stock != record.current_stock_status;

        let mut alert_type = None;
        if record.monitoring_enabled {
            let mut change_event_id = None;
            if price_changed || stock_changed {
                // One event per check; a simultaneous price and stock change
                // is recorded under the price change.
                let event = if price_changed {
                    ChangeEvent::new(
                        record.id.clone(),
                        ChangeKind::PriceChange,
                        record.current_price_minor.to_string(),
                        new_price.to_string(),
                    )
                } else {
                    ChangeEvent::new(
                        record.id.clone(),
                        ChangeKind::StockChange,
                        stock_label(record.current_stock_status).to_string(),
                        stock_label(new_stock).to_string(),
                    )
                };
                if let Err(e) = self.store.append_change_event(&event).await {
                    warn!(inventory_id = %record.id, error = %e, "failed to record change event");
                    return CheckOutcome::failure(record, e.to_string());
                }
                change_event_id = Some(event.id);
            }

            alert_type = alert_decision(record, new_price, new_stock);
            if let Some(kind) = alert_type {
                let message = match kind {
                    AlertType::PriceDrop => format!(
                        "{}: price dropped to {} (threshold {})",
                        record.product_id, new_price, record.alert_threshold_minor
                    ),
                    AlertType::StockAvailable => {
                        format!("{}: back in stock at {}", record.product_id, new_price)
                    }
                };
                let alert = Alert::new(record.id.clone(), kind, message, change_event_id);
                if let Err(e) = self.store.append_alert(&alert).await {
                    warn!(inventory_id = %record.id, error = %e, "failed to persist alert");
                    return CheckOutcome::failure(record, e.to_string());
                }
                // Delivery failure is logged but the check still succeeds;
                // the alert row is already durable.
                if let Err(e) = self.sink.deliver(&alert).await {
                    warn!(alert_id = %alert.id, sink = self.sink.name(), error = %e, "alert delivery failed");
                }
                info!(inventory_id = %record.id, alert_type = ?kind, "alert fired");
            }
        } else {
            debug!(inventory_id = %record.id, "monitoring disabled, state refreshed only");
        }

        if let Err(e) = self
            .store
            .update_inventory_check(&record.id, new_price, new_stock, Utc::now())
            .await
        {
            warn!(inventory_id = %record.id, error = %e, "failed to update record after check");
            return CheckOutcome::failure(record, e.to_string());
        }

        CheckOutcome {
            inventory_id: record.id.clone(),
            product_id: record.product_id.clone(),
            platform: record.platform.clone(),
            success: true,
            price_changed,
            stock_changed,
            alert: alert_type,
            error: None,
        }
    }

    /// Sequential batch over the stalest due records. A deadline, when set,
    /// is checked between items; an expired deadline stops the batch cleanly
    /// and the skipped records stay due for the next run.
    pub async fn check_batch(
        &self,
        limit: usize,
        deadline: Option<Instant>,
    ) -> Result<BatchResult> {
        let records = self.store.select_stale_records(limit).await?;
        info!(due = records.len(), "starting monitoring batch");

        let mut results = Vec::with_capacity(records.len());
        let mut cancelled = false;

        for (index, record) in records.iter().enumerate() {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    warn!(remaining = records.len() - index, "batch deadline reached");
                    cancelled = true;
                    break;
                }
            }
            if index > 0 {
                tokio::time::sleep(self.item_delay).await;
            }
            results.push(self.check_one(record).await);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = results.len() - succeeded;
        let alerts_fired = results.iter().filter(|r| r.alert.is_some()).count();
        info!(
            checked = results.len(),
            succeeded, failed, alerts_fired, cancelled, "monitoring batch finished"
        );

        Ok(BatchResult {
            checked: results.len(),
            succeeded,
            failed,
            alerts_fired,
            cancelled,
            results,
        })
    }
}

/// Alert predicate. A price drop to or below the threshold wins over a
/// restock when both apply in the same check.
fn alert_decision(
    record: &InventoryRecord,
    new_price: i64,
    new_stock: StockStatus,
) -> Option<AlertType> {
    if new_price > 0 && new_price <= record.alert_threshold_minor {
        return Some(AlertType::PriceDrop);
    }
    if record.current_stock_status == StockStatus::SoldOut && new_stock == StockStatus::InStock {
        return Some(AlertType::StockAvailable);
    }
    None
}

fn stock_label(status: StockStatus) -> &'static str {
    match status {
        StockStatus::InStock => "in_stock",
        StockStatus::SoldOut => "sold_out",
    }
}
