use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::Result;
use crate::models::{
    Alert, ChangeEvent, InventoryRecord, NewInventoryRecord, ProductSnapshot, StockStatus,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS product_snapshots (
        product_id TEXT NOT NULL,
        platform TEXT NOT NULL,
        source_url TEXT NOT NULL,
        title TEXT NOT NULL,
        price_minor INTEGER NOT NULL,
        condition TEXT NOT NULL,
        stock_status TEXT NOT NULL,
        rarity TEXT NOT NULL,
        set_name TEXT NOT NULL,
        card_number TEXT NOT NULL,
        description TEXT NOT NULL,
        image_url TEXT NOT NULL,
        category_data_json TEXT NOT NULL,
        scraped_at TEXT NOT NULL,
        PRIMARY KEY (product_id, platform)
    )",
    "CREATE INDEX IF NOT EXISTS idx_snapshots_source_url
        ON product_snapshots (source_url)",
    "CREATE TABLE IF NOT EXISTS inventory_records (
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL,
        platform TEXT NOT NULL,
        source_url TEXT NOT NULL,
        monitoring_enabled INTEGER NOT NULL,
        alert_threshold_minor INTEGER NOT NULL,
        check_interval_hours INTEGER NOT NULL,
        last_checked_at TEXT,
        current_price_minor INTEGER NOT NULL,
        current_stock_status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (product_id, platform)
    )",
    "CREATE INDEX IF NOT EXISTS idx_inventory_last_checked
        ON inventory_records (monitoring_enabled, last_checked_at)",
    "CREATE TABLE IF NOT EXISTS change_events (
        id TEXT PRIMARY KEY,
        inventory_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        old_value TEXT NOT NULL,
        new_value TEXT NOT NULL,
        checked_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_change_events_inventory
        ON change_events (inventory_id)",
    "CREATE TABLE IF NOT EXISTS alerts (
        id TEXT PRIMARY KEY,
        inventory_id TEXT NOT NULL,
        alert_type TEXT NOT NULL,
        message TEXT NOT NULL,
        change_event_id TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_inventory
        ON alerts (inventory_id)",
];

/// SQLite-backed persistent store. Every write is a single-row upsert or
/// append; the (product_id, platform) pair is the uniqueness invariant for
/// snapshots and inventory records.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Creates tables and indexes if missing. Idempotent.
    pub async fn init(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // --- snapshots ---

    pub async fn upsert_snapshot(&self, snapshot: &ProductSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO product_snapshots (
                product_id, platform, source_url, title, price_minor, condition,
                stock_status, rarity, set_name, card_number, description,
                image_url, category_data_json, scraped_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (product_id, platform) DO UPDATE SET
                source_url = excluded.source_url,
                title = excluded.title,
                price_minor = excluded.price_minor,
                condition = excluded.condition,
                stock_status = excluded.stock_status,
                rarity = excluded.rarity,
                set_name = excluded.set_name,
                card_number = excluded.card_number,
                description = excluded.description,
                image_url = excluded.image_url,
                category_data_json = excluded.category_data_json,
                scraped_at = excluded.scraped_at",
        )
        .bind(&snapshot.product_id)
        .bind(&snapshot.platform)
        .bind(&snapshot.source_url)
        .bind(&snapshot.title)
        .bind(snapshot.price_minor)
        .bind(snapshot.condition)
        .bind(snapshot.stock_status)
        .bind(&snapshot.rarity)
        .bind(&snapshot.set_name)
        .bind(&snapshot.card_number)
        .bind(&snapshot.description)
        .bind(&snapshot.image_url)
        .bind(&snapshot.category_data_json)
        .bind(snapshot.scraped_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Dedup lookup: by key pair or by exact source URL.
    pub async fn find_snapshot(
        &self,
        product_id: &str,
        platform: &str,
        source_url: &str,
    ) -> Result<Option<ProductSnapshot>> {
        let snapshot = sqlx::query_as::<_, ProductSnapshot>(
            "SELECT * FROM product_snapshots
             WHERE (product_id = ? AND platform = ?) OR source_url = ?
             LIMIT 1",
        )
        .bind(product_id)
        .bind(platform)
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }

    pub async fn get_snapshot(
        &self,
        product_id: &str,
        platform: &str,
    ) -> Result<Option<ProductSnapshot>> {
        let snapshot = sqlx::query_as::<_, ProductSnapshot>(
            "SELECT * FROM product_snapshots WHERE product_id = ? AND platform = ?",
        )
        .bind(product_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }

    pub async fn touch_snapshot(
        &self,
        product_id: &str,
        platform: &str,
        scraped_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE product_snapshots SET scraped_at = ? WHERE product_id = ? AND platform = ?",
        )
        .bind(scraped_at)
        .bind(product_id)
        .bind(platform)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_snapshots(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM product_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // --- inventory records ---

    /// Insert-or-update keyed on (product_id, platform). The alert threshold,
    /// check interval and monitoring flag are set once at creation and left
    /// untouched by later extractions. Returns the stored row.
    pub async fn upsert_inventory(&self, new_record: NewInventoryRecord) -> Result<InventoryRecord> {
        let record = InventoryRecord::new(new_record);
        sqlx::query(
            "INSERT INTO inventory_records (
                id, product_id, platform, source_url, monitoring_enabled,
                alert_threshold_minor, check_interval_hours, last_checked_at,
                current_price_minor, current_stock_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (product_id, platform) DO UPDATE SET
                source_url = excluded.source_url,
                current_price_minor = excluded.current_price_minor,
                current_stock_status = excluded.current_stock_status,
                updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.product_id)
        .bind(&record.platform)
        .bind(&record.source_url)
        .bind(record.monitoring_enabled)
        .bind(record.alert_threshold_minor)
        .bind(record.check_interval_hours)
        .bind(record.last_checked_at)
        .bind(record.current_price_minor)
        .bind(record.current_stock_status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        let stored = self
            .get_inventory(&record.product_id, &record.platform)
            .await?
            .ok_or_else(|| crate::AppError::Internal("inventory row vanished after upsert".to_string()))?;
        Ok(stored)
    }

    pub async fn get_inventory(
        &self,
        product_id: &str,
        platform: &str,
    ) -> Result<Option<InventoryRecord>> {
        let record = sqlx::query_as::<_, InventoryRecord>(
            "SELECT * FROM inventory_records WHERE product_id = ? AND platform = ?",
        )
        .bind(product_id)
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn set_monitoring_enabled(&self, inventory_id: &str, enabled: bool) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_records SET monitoring_enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(enabled)
        .bind(Utc::now())
        .bind(inventory_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_alert_threshold(&self, inventory_id: &str, threshold_minor: i64) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_records SET alert_threshold_minor = ?, updated_at = ? WHERE id = ?",
        )
        .bind(threshold_minor)
        .bind(Utc::now())
        .bind(inventory_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Commits the result of one monitoring check.
    pub async fn update_inventory_check(
        &self,
        inventory_id: &str,
        price_minor: i64,
        stock_status: StockStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE inventory_records SET
                current_price_minor = ?,
                current_stock_status = ?,
                last_checked_at = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(price_minor)
        .bind(stock_status)
        .bind(checked_at)
        .bind(checked_at)
        .bind(inventory_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Monitored records in staleness order: never-checked first, then oldest
    /// last_checked_at. The per-record interval filter runs in-process so the
    /// stored timestamps never go through SQL date arithmetic; the query
    /// oversamples to leave room for not-yet-due rows dropped by that filter.
    pub async fn select_stale_records(&self, limit: usize) -> Result<Vec<InventoryRecord>> {
        let scan_limit = limit.saturating_mul(8).max(64) as i64;
        let rows = sqlx::query_as::<_, InventoryRecord>(
            "SELECT * FROM inventory_records
             WHERE monitoring_enabled = 1
             ORDER BY last_checked_at ASC
             LIMIT ?",
        )
        .bind(scan_limit)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        Ok(rows
            .into_iter()
            .filter(|record| record.is_due(now))
            .take(limit)
            .collect())
    }

    // --- change events and alerts ---

    pub async fn append_change_event(&self, event: &ChangeEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO change_events (id, inventory_id, kind, old_value, new_value, checked_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.inventory_id)
        .bind(event.kind)
        .bind(&event.old_value)
        .bind(&event.new_value)
        .bind(event.checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn append_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            "INSERT INTO alerts (id, inventory_id, alert_type, message, change_event_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&alert.id)
        .bind(&alert.inventory_id)
        .bind(alert.alert_type)
        .bind(&alert.message)
        .bind(&alert.change_event_id)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_change_events(&self, inventory_id: &str) -> Result<Vec<ChangeEvent>> {
        let events = sqlx::query_as::<_, ChangeEvent>(
            "SELECT * FROM change_events WHERE inventory_id = ? ORDER BY checked_at ASC",
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn list_alerts(&self, inventory_id: &str) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE inventory_id = ? ORDER BY created_at ASC",
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }
}
