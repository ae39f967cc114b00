use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::debug;

pub mod fetch;
pub mod normalize;
pub mod parse;

pub use fetch::{HttpFetcher, PageFetcher, PageResponse};

use crate::models::{NewInventoryRecord, NewProductSnapshot, ProductSnapshot};
use crate::platforms::{DEFAULT_USER_AGENTS, PlatformProfile, classifier};
use crate::storage::Store;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("URL does not match any pattern for platform {platform}: {url}")]
    InvalidUrl { platform: String, url: String },

    #[error("could not derive a product id for platform {platform} from: {url}")]
    IdExtractionFailed { platform: String, url: String },

    #[error("fetch failed after {attempts} attempts: {reason}")]
    FetchFailed { attempts: u32, reason: String },

    #[error("response is not an HTML document")]
    InvalidDocument,

    #[error("persistence failed: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub product_id: String,
    pub platform: String,
    /// True when the dedup check hit an existing snapshot and no page fetch
    /// was made.
    pub duplicate: bool,
    /// Fields that fell back to their documented default.
    pub degraded_fields: Vec<&'static str>,
    pub snapshot: ProductSnapshot,
}

/// Shared extraction pipeline: validate, derive id, dedup, fetch with retry,
/// parse selector chains, normalize, persist, register for monitoring.
/// Per-platform behavior comes entirely from the PlatformProfile.
pub struct Extractor {
    store: Arc<Store>,
    fetcher: Arc<dyn PageFetcher>,
    ua_cursor: AtomicUsize,
}

impl Extractor {
    pub fn new(store: Arc<Store>, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            store,
            fetcher,
            ua_cursor: AtomicUsize::new(0),
        }
    }

    /// On-demand extraction: a repeated URL short-circuits through the dedup
    /// check with a timestamp-only refresh and never re-fetches the page.
    pub async fn extract(
        &self,
        profile: &PlatformProfile,
        url: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        self.run(profile, url, true).await
    }

    /// Monitoring re-check: always re-fetches and leaves the inventory row
    /// alone. Current price/stock and the check timestamp are committed by
    /// the monitor after it has journaled the deltas, so a check that fails
    /// midway compares against unmodified state on retry.
    pub async fn recheck(
        &self,
        profile: &PlatformProfile,
        url: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        self.run(profile, url, false).await
    }

    async fn run(
        &self,
        profile: &PlatformProfile,
        url: &str,
        on_demand: bool,
    ) -> Result<ExtractionResult, ExtractError> {
        let invalid = || ExtractError::InvalidUrl {
            platform: profile.id.clone(),
            url: url.to_string(),
        };
        let normalized = classifier::normalize_url(url).ok_or_else(invalid)?;
        if !profile.matches_url(&normalized) {
            return Err(invalid());
        }

        // Fast-fails before any network traffic.
        let product_id =
            profile
                .extract_product_id(&normalized)
                .ok_or_else(|| ExtractError::IdExtractionFailed {
                    platform: profile.id.clone(),
                    url: normalized.clone(),
                })?;

        if on_demand {
            let existing = self
                .store
                .find_snapshot(&product_id, &profile.id, &normalized)
                .await
                .map_err(|e| ExtractError::Persistence(e.to_string()))?;
            if let Some(mut snapshot) = existing {
                let now = Utc::now();
                self.store
                    .touch_snapshot(&snapshot.product_id, &snapshot.platform, now)
                    .await
                    .map_err(|e| ExtractError::Persistence(e.to_string()))?;
                snapshot.scraped_at = now;
                debug!(platform = %profile.id, product_id = %snapshot.product_id, "duplicate URL, snapshot refreshed");
                return Ok(ExtractionResult {
                    product_id: snapshot.product_id.clone(),
                    platform: snapshot.platform.clone(),
                    duplicate: true,
                    degraded_fields: Vec::new(),
                    snapshot,
                });
            }
        }

        let body = self.fetch_page(profile, &normalized).await?;

        let raw = parse::parse_fields(&body, &profile.selectors)?;
        let degraded_fields = raw.degraded_fields();
        if !degraded_fields.is_empty() {
            debug!(platform = %profile.id, fields = ?degraded_fields, "extraction degraded, defaults substituted");
        }

        let title = raw
            .title
            .as_deref()
            .map(normalize::clean_title)
            .unwrap_or_else(|| "Unknown".to_string());
        let price_minor = raw
            .price_text
            .as_deref()
            .map(normalize::parse_price_minor)
            .unwrap_or(0);
        let condition = normalize::map_condition(raw.condition_text.as_deref().unwrap_or(""));
        let stock_status =
            normalize::infer_stock(&[title.as_str(), raw.stock_text.as_deref().unwrap_or("")]);

        let mut category_data = BTreeMap::new();
        if let Some(text) = &raw.condition_text {
            category_data.insert("condition_text".to_string(), text.clone());
        }
        if let Some(text) = &raw.stock_text {
            category_data.insert("stock_text".to_string(), text.clone());
        }

        let snapshot = ProductSnapshot::new(NewProductSnapshot {
            product_id: product_id.clone(),
            platform: profile.id.clone(),
            source_url: normalized.clone(),
            title,
            price_minor,
            condition,
            stock_status,
            rarity: raw.rarity.unwrap_or_default(),
            set_name: raw.set_name.unwrap_or_default(),
            card_number: raw.card_number.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            image_url: raw.image_url.unwrap_or_default(),
            category_data,
        });

        self.store
            .upsert_snapshot(&snapshot)
            .await
            .map_err(|e| ExtractError::Persistence(e.to_string()))?;
        if on_demand {
            self.store
                .upsert_inventory(NewInventoryRecord {
                    product_id: product_id.clone(),
                    platform: profile.id.clone(),
                    source_url: normalized,
                    price_minor: snapshot.price_minor,
                    stock_status: snapshot.stock_status,
                    check_interval_hours: None,
                })
                .await
                .map_err(|e| ExtractError::Persistence(e.to_string()))?;
        }

        Ok(ExtractionResult {
            product_id,
            platform: profile.id.clone(),
            duplicate: false,
            degraded_fields,
            snapshot,
        })
    }

    /// GET with per-profile retry, User-Agent rotation and politeness delays.
    /// Retries wait request_delay_ms between attempts; one more politeness
    /// sleep follows the final attempt so back-to-back extractions against
    /// the same platform stay throttled.
    async fn fetch_page(
        &self,
        profile: &PlatformProfile,
        url: &str,
    ) -> Result<String, ExtractError> {
        let strategy =
            FixedInterval::from_millis(profile.request_delay_ms).take(profile.max_retries as usize);
        let timeout = Duration::from_millis(profile.timeout_ms);

        let result = Retry::spawn(strategy, || async {
            let cursor = self.ua_cursor.fetch_add(1, Ordering::Relaxed);
            let user_agent = match profile.user_agents.len() {
                0 => DEFAULT_USER_AGENTS[0],
                n => profile.user_agents[cursor % n].as_str(),
            };

            let response = self
                .fetcher
                .fetch(url, user_agent, timeout)
                .await
                .map_err(|e| e.to_string())?;
            if !response.is_success() {
                return Err(format!("HTTP status {}", response.status));
            }
            if response.body.trim().is_empty() {
                return Err("empty response body".to_string());
            }
            Ok(response.body)
        })
        .await;

        tokio::time::sleep(Duration::from_millis(profile.request_delay_ms)).await;

        result.map_err(|reason| ExtractError::FetchFailed {
            attempts: profile.max_retries + 1,
            reason,
        })
    }
}
