// Shared fixtures for the integration tests: an in-memory store, a synthetic
// marketplace profile and a scripted fetcher that replays canned responses
// without touching the network.

use async_trait::async_trait;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cardwatch::extractor::{PageFetcher, PageResponse};
use cardwatch::platforms::{FieldSelectors, PlatformProfile, PlatformRegistry};
use cardwatch::storage::Store;

pub async fn memory_store() -> Store {
    let store = Store::connect("sqlite::memory:", 1).await.unwrap();
    store.init().await.unwrap();
    store
}

/// Synthetic marketplace with zero request delay so retries run instantly.
pub fn test_profile() -> PlatformProfile {
    PlatformProfile {
        id: "testmart".to_string(),
        display_name: "Testmart".to_string(),
        base_host: "testmart.example".to_string(),
        url_patterns: vec![Regex::new(r"^https://testmart\.example/item/[a-z0-9]+").unwrap()],
        id_patterns: vec![Regex::new(r"/item/([a-z0-9]+)").unwrap()],
        selectors: FieldSelectors {
            title: vec![".product-title".to_string(), "h1".to_string()],
            price: vec![".price".to_string()],
            stock: vec![".stock".to_string()],
            image: vec![".main-image".to_string()],
            condition: vec![".condition".to_string()],
            rarity: vec![".rarity".to_string()],
            set_name: vec![".set-name".to_string()],
            card_number: vec![".card-number".to_string()],
        },
        max_retries: 2,
        timeout_ms: 1_000,
        request_delay_ms: 0,
        user_agents: vec!["test-agent/1.0".to_string()],
    }
}

pub fn test_registry() -> PlatformRegistry {
    PlatformRegistry::new(vec![test_profile()])
}

pub fn item_url(id: &str) -> String {
    format!("https://testmart.example/item/{id}")
}

/// Minimal page satisfying every selector chain in the test profile.
pub fn product_page(title: &str, price: &str, stock: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="product-title">{title}</h1>
            <span class="price">{price}</span>
            <div class="stock">{stock}</div>
            <span class="condition">美品</span>
            <span class="rarity">SR</span>
            <span class="set-name">スカーレット&バイオレット</span>
            <span class="card-number">SV1a 023/073</span>
            <img class="main-image" src="https://img.testmart.example/x.jpg">
        </body></html>"#
    )
}

pub fn ok(body: String) -> PageResponse {
    PageResponse { status: 200, body }
}

pub fn server_error() -> PageResponse {
    PageResponse {
        status: 500,
        body: "<html>error</html>".to_string(),
    }
}

/// Replays a per-call queue first, then per-URL routes, then 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    queue: Mutex<VecDeque<PageResponse>>,
    routes: Mutex<HashMap<String, PageResponse>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: PageResponse) {
        self.queue.lock().unwrap().push_back(response);
    }

    pub fn route(&self, url: &str, response: PageResponse) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        url: &str,
        _user_agent: &str,
        _timeout: Duration,
    ) -> cardwatch::Result<PageResponse> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(response) = self.queue.lock().unwrap().pop_front() {
            return Ok(response);
        }
        if let Some(response) = self.routes.lock().unwrap().get(url) {
            return Ok(response.clone());
        }
        Ok(PageResponse {
            status: 404,
            body: String::new(),
        })
    }
}
