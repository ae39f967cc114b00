use regex::Regex;

pub mod classifier;
pub mod registry;

pub use classifier::{Classification, classify, normalize_url};
pub use registry::PlatformRegistry;

/// Browser User-Agents rotated across fetch attempts.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Priority-ordered CSS selector chains per logical field. The first selector
/// that yields non-empty text wins; an empty chain means the field relies on
/// the document-level fallback regex or its default.
#[derive(Debug, Clone, Default)]
pub struct FieldSelectors {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub stock: Vec<String>,
    pub image: Vec<String>,
    pub condition: Vec<String>,
    pub rarity: Vec<String>,
    pub set_name: Vec<String>,
    pub card_number: Vec<String>,
}

/// Static per-marketplace profile. Loaded once at startup, never mutated.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub id: String,
    pub display_name: String,
    pub base_host: String,
    pub url_patterns: Vec<Regex>,
    /// Each pattern carries one capture group holding the raw product id.
    pub id_patterns: Vec<Regex>,
    pub selectors: FieldSelectors,
    pub max_retries: u32,
    pub timeout_ms: u64,
    pub request_delay_ms: u64,
    pub user_agents: Vec<String>,
}

impl PlatformProfile {
    pub fn matches_url(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|p| p.is_match(url))
    }

    /// Derives the platform-namespaced product id, e.g. "mercari_m12345678".
    pub fn extract_product_id(&self, url: &str) -> Option<String> {
        for pattern in &self.id_patterns {
            if let Some(captures) = pattern.captures(url) {
                if let Some(raw) = captures.get(1) {
                    let raw = raw.as_str();
                    if !raw.is_empty() {
                        return Some(format!("{}_{}", self.id, raw));
                    }
                }
            }
        }
        None
    }
}
