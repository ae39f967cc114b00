use std::collections::BTreeSet;
use url::Url;

use crate::platforms::{PlatformProfile, PlatformRegistry};

/// Minimum weighted score a profile must exceed to be accepted.
pub const CONFIDENCE_FLOOR: f64 = 0.8;

/// Query parameters that survive URL normalization; everything else is
/// tracking noise that would break pattern matching and dedup.
const ALLOWED_QUERY_PARAMS: &[&str] = &["id", "product_id", "item_id", "sku"];

/// Host-name segments that carry no platform signal.
const STOP_TOKENS: &[&str] = &["www", "com", "co", "jp", "net", "shop", "store"];

const PATTERN_WEIGHT: f64 = 0.6;
const HOST_EXACT_WEIGHT: f64 = 0.3;
const HOST_PARTIAL_WEIGHT: f64 = 0.15;
const TOKEN_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Classification<'a> {
    pub platform: &'a str,
    pub profile: &'a PlatformProfile,
    pub confidence: f64,
    pub normalized_url: String,
}

/// Scores the URL against every registered profile and returns the
/// highest-scoring profile above the confidence floor. Pure function over the
/// registry and input; ties keep registry order.
pub fn classify<'a>(registry: &'a PlatformRegistry, raw_url: &str) -> Option<Classification<'a>> {
    let normalized = normalize_url(raw_url)?;

    let mut best: Option<Classification<'a>> = None;
    for profile in registry.iter() {
        let confidence = score(profile, &normalized);
        if confidence <= CONFIDENCE_FLOOR {
            continue;
        }
        let better = match &best {
            Some(current) => confidence > current.confidence,
            None => true,
        };
        if better {
            best = Some(Classification {
                platform: &profile.id,
                profile,
                confidence,
                normalized_url: normalized.clone(),
            });
        }
    }
    best
}

/// Canonicalizes a product URL: https scheme, no leading "www.", no trailing
/// slash, allow-listed query parameters only. Returns None for unparseable
/// input or URLs without a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let path = url.path().trim_end_matches('/');

    let kept: Vec<String> = url
        .query_pairs()
        .filter(|(key, _)| ALLOWED_QUERY_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    let mut normalized = match url.port() {
        Some(port) => format!("https://{host}:{port}{path}"),
        None => format!("https://{host}{path}"),
    };
    if !kept.is_empty() {
        normalized.push('?');
        normalized.push_str(&kept.join("&"));
    }
    Some(normalized)
}

/// Weighted confidence score in [0, 1] for a normalized URL against one
/// profile: 0.6 for a pattern match, 0.3/0.15 for exact/partial host match,
/// up to 0.1 for host token overlap.
pub fn score(profile: &PlatformProfile, normalized_url: &str) -> f64 {
    let mut total = 0.0;

    if profile.matches_url(normalized_url) {
        total += PATTERN_WEIGHT;
    }

    let url_host = Url::parse(normalized_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default();
    let base_host = profile
        .base_host
        .strip_prefix("www.")
        .unwrap_or(&profile.base_host)
        .to_ascii_lowercase();

    if !url_host.is_empty() {
        // A subdomain of the base host (item.fril.jp, page.auctions.yahoo.co.jp)
        // is the same marketplace, not a partial match.
        if url_host == base_host || url_host.ends_with(&format!(".{base_host}")) {
            total += HOST_EXACT_WEIGHT;
        } else if url_host.contains(&base_host) || base_host.contains(&url_host) {
            total += HOST_PARTIAL_WEIGHT;
        }
    }

    let url_tokens = host_tokens(&url_host);
    let base_tokens = host_tokens(&base_host);
    let denominator = url_tokens.len().max(base_tokens.len());
    if denominator > 0 {
        let overlap = url_tokens.intersection(&base_tokens).count();
        total += TOKEN_WEIGHT * overlap as f64 / denominator as f64;
    }

    total
}

fn host_tokens(host: &str) -> BTreeSet<String> {
    host.split(['.', '-', '_'])
        .filter(|t| !t.is_empty() && !STOP_TOKENS.contains(t))
        .map(|t| t.to_string())
        .collect()
}
