mod integration;

use integration::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use cardwatch::alerts::LogAlertSink;
use cardwatch::extractor::{ExtractError, Extractor};
use cardwatch::models::{AlertType, ChangeKind, Condition, NewInventoryRecord, StockStatus};
use cardwatch::monitor::InventoryMonitor;
use cardwatch::storage::Store;

async fn world() -> (Arc<Store>, Arc<ScriptedFetcher>, Arc<Extractor>, InventoryMonitor) {
    let store = Arc::new(memory_store().await);
    let fetcher = Arc::new(ScriptedFetcher::new());
    let extractor = Arc::new(Extractor::new(Arc::clone(&store), fetcher.clone()));
    let monitor = InventoryMonitor::new(
        Arc::clone(&store),
        Arc::new(test_registry()),
        Arc::clone(&extractor),
        Arc::new(LogAlertSink),
    )
    .with_item_delay(Duration::ZERO);
    (store, fetcher, extractor, monitor)
}

fn seed(suffix: &str, price_minor: i64, stock: StockStatus) -> NewInventoryRecord {
    NewInventoryRecord {
        product_id: format!("testmart_{suffix}"),
        platform: "testmart".to_string(),
        source_url: item_url(suffix),
        price_minor,
        stock_status: stock,
        check_interval_hours: None,
    }
}

#[tokio::test]
async fn test_extraction_end_to_end() {
    let (store, fetcher, extractor, _) = world().await;
    let profile = test_profile();
    fetcher.route(
        &item_url("abc1"),
        ok(product_page("ピカチュウ ex SR - テストマート", "1,280円", "在庫あり")),
    );

    let result = extractor.extract(&profile, &item_url("abc1")).await.unwrap();

    assert!(!result.duplicate);
    assert_eq!(result.product_id, "testmart_abc1");
    assert_eq!(result.snapshot.title, "ピカチュウ ex SR");
    assert_eq!(result.snapshot.price_minor, 1280);
    assert_eq!(result.snapshot.condition, Condition::Excellent); // 美品
    assert_eq!(result.snapshot.stock_status, StockStatus::InStock);
    assert_eq!(result.snapshot.rarity, "SR");
    assert!(result.degraded_fields.is_empty());

    // Persisted snapshot and monitoring registration
    let stored = store.get_snapshot("testmart_abc1", "testmart").await.unwrap();
    assert_eq!(stored.unwrap().price_minor, 1280);
    let record = store.get_inventory("testmart_abc1", "testmart").await.unwrap().unwrap();
    assert!(record.monitoring_enabled);
    assert_eq!(record.alert_threshold_minor, 1024); // 80% of 1280
}

#[tokio::test]
async fn test_repeat_extraction_is_deduplicated() {
    let (store, fetcher, extractor, _) = world().await;
    let profile = test_profile();
    fetcher.route(
        &item_url("abc1"),
        ok(product_page("ピカチュウ ex", "1,280円", "在庫あり")),
    );

    let first = extractor.extract(&profile, &item_url("abc1")).await.unwrap();
    let second = extractor.extract(&profile, &item_url("abc1")).await.unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(second.product_id, first.product_id);
    assert_eq!(fetcher.calls(), 1); // no second page fetch
    assert_eq!(store.count_snapshots().await.unwrap(), 1);
    // dedup still refreshes the timestamp
    assert!(second.snapshot.scraped_at >= first.snapshot.scraped_at);
}

#[tokio::test]
async fn test_fetch_retries_then_fails() {
    let (_, fetcher, extractor, _) = world().await;
    let profile = test_profile();
    // no routes: every attempt sees a 404

    let result = extractor.extract(&profile, &item_url("gone1")).await;

    match result {
        Err(ExtractError::FetchFailed { attempts, reason }) => {
            assert_eq!(attempts, 3); // max_retries 2 + initial attempt
            assert!(reason.contains("404"));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn test_fetch_recovers_after_transient_errors() {
    let (_, fetcher, extractor, _) = world().await;
    let profile = test_profile();
    fetcher.push(server_error());
    fetcher.push(server_error());
    fetcher.route(&item_url("flaky1"), ok(product_page("カード", "1,000円", "在庫あり")));

    let result = extractor.extract(&profile, &item_url("flaky1")).await.unwrap();

    assert_eq!(result.snapshot.price_minor, 1000);
    assert_eq!(fetcher.calls(), 3); // two failures, then the routed page
}

#[tokio::test]
async fn test_empty_user_agent_pool_falls_back() {
    let (_, fetcher, extractor, _) = world().await;
    let mut profile = test_profile();
    profile.user_agents.clear();
    fetcher.route(&item_url("noua1"), ok(product_page("カード", "1,000円", "在庫あり")));

    let result = extractor.extract(&profile, &item_url("noua1")).await.unwrap();
    assert_eq!(result.product_id, "testmart_noua1");
}

#[tokio::test]
async fn test_invalid_url_fails_before_fetch() {
    let (_, fetcher, extractor, _) = world().await;
    let profile = test_profile();

    let result = extractor
        .extract(&profile, "https://other-shop.example/product/123")
        .await;

    assert!(matches!(result, Err(ExtractError::InvalidUrl { .. })));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_degraded_extraction_lists_defaulted_fields() {
    let (store, fetcher, extractor, _) = world().await;
    let profile = test_profile();
    fetcher.route(
        &item_url("bare1"),
        ok("<html><body><h1 class=\"product-title\">名無しカード</h1>\
            <div class=\"stock\">在庫あり</div></body></html>"
            .to_string()),
    );

    let result = extractor.extract(&profile, &item_url("bare1")).await.unwrap();

    assert!(result.degraded_fields.contains(&"price"));
    assert!(result.degraded_fields.contains(&"image"));
    assert!(result.degraded_fields.contains(&"condition"));
    assert_eq!(result.snapshot.price_minor, 0);
    assert_eq!(result.snapshot.condition, Condition::Unknown);
    // degraded results are still persisted
    assert!(store.get_snapshot("testmart_bare1", "testmart").await.unwrap().is_some());
}

#[tokio::test]
async fn test_price_drop_alert_fires_at_threshold() {
    let (store, fetcher, _, monitor) = world().await;
    // registered at 1000 -> threshold 800
    let record = store.upsert_inventory(seed("drop1", 1000, StockStatus::InStock)).await.unwrap();
    fetcher.route(&item_url("drop1"), ok(product_page("カード", "800円", "在庫あり")));

    let outcome = monitor.check_one(&record).await;

    assert!(outcome.success);
    assert!(outcome.price_changed);
    assert_eq!(outcome.alert, Some(AlertType::PriceDrop));

    let alerts = store.list_alerts(&record.id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::PriceDrop);
    let events = store.list_change_events(&record.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::PriceChange);
    assert_eq!(alerts[0].change_event_id.as_deref(), Some(events[0].id.as_str()));
}

#[tokio::test]
async fn test_price_above_threshold_stays_silent() {
    let (store, fetcher, _, monitor) = world().await;
    let record = store.upsert_inventory(seed("near1", 1000, StockStatus::InStock)).await.unwrap();
    fetcher.route(&item_url("near1"), ok(product_page("カード", "801円", "在庫あり")));

    let outcome = monitor.check_one(&record).await;

    assert!(outcome.success);
    assert!(outcome.price_changed);
    assert_eq!(outcome.alert, None);
    // the change is still recorded for the audit trail
    assert_eq!(store.list_change_events(&record.id).await.unwrap().len(), 1);
    assert!(store.list_alerts(&record.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restock_alert() {
    let (store, fetcher, _, monitor) = world().await;
    let record = store.upsert_inventory(seed("back1", 1000, StockStatus::SoldOut)).await.unwrap();
    fetcher.route(&item_url("back1"), ok(product_page("カード", "1,000円", "在庫あり")));

    let outcome = monitor.check_one(&record).await;

    assert!(outcome.success);
    assert!(!outcome.price_changed);
    assert!(outcome.stock_changed);
    assert_eq!(outcome.alert, Some(AlertType::StockAvailable));

    let events = store.list_change_events(&record.id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::StockChange);
    assert_eq!(events[0].new_value, "in_stock");
}

#[tokio::test]
async fn test_disabled_record_refreshes_without_alerting() {
    let (store, fetcher, _, monitor) = world().await;
    let record = store.upsert_inventory(seed("off1", 1000, StockStatus::InStock)).await.unwrap();
    store.set_monitoring_enabled(&record.id, false).await.unwrap();
    let record = store.get_inventory("testmart_off1", "testmart").await.unwrap().unwrap();
    fetcher.route(&item_url("off1"), ok(product_page("カード", "500円", "在庫あり")));

    let outcome = monitor.check_one(&record).await;

    assert!(outcome.success);
    assert_eq!(outcome.alert, None);
    assert!(store.list_alerts(&record.id).await.unwrap().is_empty());
    assert!(store.list_change_events(&record.id).await.unwrap().is_empty());

    // current state and the check timestamp still move
    let updated = store.get_inventory("testmart_off1", "testmart").await.unwrap().unwrap();
    assert_eq!(updated.current_price_minor, 500);
    assert!(updated.last_checked_at.is_some());
}

#[tokio::test]
async fn test_recheck_does_not_advance_monitor_state() {
    let (store, fetcher, extractor, monitor) = world().await;
    let record = store.upsert_inventory(seed("re1", 1000, StockStatus::SoldOut)).await.unwrap();
    fetcher.route(&item_url("re1"), ok(product_page("カード", "1,000円", "在庫あり")));

    // A bare recheck refreshes the snapshot but must leave the inventory
    // row's current values alone, or the monitor would lose the transition
    // if it fails before journaling it.
    let profile = test_profile();
    extractor.recheck(&profile, &item_url("re1")).await.unwrap();
    let untouched = store.get_inventory("testmart_re1", "testmart").await.unwrap().unwrap();
    assert_eq!(untouched.current_stock_status, StockStatus::SoldOut);
    assert!(untouched.last_checked_at.is_none());

    // The monitor still sees the sold_out -> in_stock transition.
    let outcome = monitor.check_one(&record).await;
    assert!(outcome.stock_changed);
    assert_eq!(outcome.alert, Some(AlertType::StockAvailable));
}

#[tokio::test]
async fn test_batch_isolates_failures() {
    let (store, fetcher, _, monitor) = world().await;
    let bad = store.upsert_inventory(seed("bad1", 1000, StockStatus::InStock)).await.unwrap();
    let good = store.upsert_inventory(seed("good1", 1000, StockStatus::InStock)).await.unwrap();
    fetcher.route(&item_url("bad1"), server_error());
    fetcher.route(&item_url("good1"), ok(product_page("カード", "1,000円", "在庫あり")));

    let result = monitor.check_batch(10, None).await.unwrap();

    assert_eq!(result.checked, 2);
    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failed, 1);
    assert!(!result.cancelled);

    let failed = result.results.iter().find(|r| !r.success).unwrap();
    assert_eq!(failed.inventory_id, bad.id);
    assert!(failed.error.as_deref().unwrap().contains("HTTP status 500"));

    // a failed check leaves the record due; a successful one does not
    let due: Vec<String> = store
        .select_stale_records(10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert!(due.contains(&bad.id));
    assert!(!due.contains(&good.id));
}

#[tokio::test]
async fn test_batch_checks_stalest_first() {
    let (store, fetcher, _, monitor) = world().await;
    let now = chrono::Utc::now();

    let never = store.upsert_inventory(seed("never1", 1000, StockStatus::InStock)).await.unwrap();
    let stale = store.upsert_inventory(seed("stale1", 1000, StockStatus::InStock)).await.unwrap();
    let fresh = store.upsert_inventory(seed("fresh1", 1000, StockStatus::InStock)).await.unwrap();
    store
        .update_inventory_check(&stale.id, 1000, StockStatus::InStock, now - chrono::Duration::hours(3))
        .await
        .unwrap();
    store
        .update_inventory_check(&fresh.id, 1000, StockStatus::InStock, now - chrono::Duration::hours(1))
        .await
        .unwrap();
    for suffix in ["never1", "stale1", "fresh1"] {
        fetcher.route(&item_url(suffix), ok(product_page("カード", "1,000円", "在庫あり")));
    }

    let result = monitor.check_batch(10, None).await.unwrap();

    // fresh1 was checked an hour ago with a 2h interval: not due
    assert_eq!(result.checked, 2);
    assert_eq!(result.results[0].inventory_id, never.id);
    assert_eq!(result.results[1].inventory_id, stale.id);
}

#[tokio::test]
async fn test_batch_deadline_cancels_cleanly() {
    let (store, fetcher, _, monitor) = world().await;
    store.upsert_inventory(seed("slow1", 1000, StockStatus::InStock)).await.unwrap();
    fetcher.route(&item_url("slow1"), ok(product_page("カード", "1,000円", "在庫あり")));

    let result = monitor.check_batch(10, Some(Instant::now())).await.unwrap();

    assert!(result.cancelled);
    assert_eq!(result.checked, 0);
    // the skipped record is still due for the next run
    assert_eq!(store.select_stale_records(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("cardwatch.db").display());

    {
        let store = Store::connect(&url, 1).await.unwrap();
        store.init().await.unwrap();
        store.upsert_inventory(seed("keep1", 1000, StockStatus::InStock)).await.unwrap();
    }

    let store = Store::connect(&url, 1).await.unwrap();
    store.init().await.unwrap();
    let record = store.get_inventory("testmart_keep1", "testmart").await.unwrap();
    assert_eq!(record.unwrap().current_price_minor, 1000);
}
