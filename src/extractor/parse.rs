use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::extractor::ExtractError;
use crate::platforms::FieldSelectors;

/// Field values as found in the document, before normalization. None means
/// every selector in the chain and the document-level fallback both failed;
/// the pipeline substitutes the documented default and reports the field as
/// degraded.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    pub title: Option<String>,
    pub price_text: Option<String>,
    pub stock_text: Option<String>,
    pub image_url: Option<String>,
    pub condition_text: Option<String>,
    pub rarity: Option<String>,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    pub description: Option<String>,
}

impl RawFields {
    /// Names of the fields that fell back to defaults.
    pub fn degraded_fields(&self) -> Vec<&'static str> {
        let mut degraded = Vec::new();
        if self.title.is_none() {
            degraded.push("title");
        }
        if self.price_text.is_none() {
            degraded.push("price");
        }
        if self.stock_text.is_none() {
            degraded.push("stock");
        }
        if self.image_url.is_none() {
            degraded.push("image");
        }
        if self.condition_text.is_none() {
            degraded.push("condition");
        }
        if self.rarity.is_none() {
            degraded.push("rarity");
        }
        if self.set_name.is_none() {
            degraded.push("set_name");
        }
        if self.card_number.is_none() {
            degraded.push("card_number");
        }
        degraded
    }
}

static TITLE_FALLBACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static PRICE_FALLBACKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"[¥￥]\s*([0-9０-９][0-9０-９,，]*)").unwrap(),
        Regex::new(r"([0-9０-９][0-9０-９,，]*)\s*円").unwrap(),
        Regex::new(r"価格[^0-9０-９]{0,8}([0-9０-９][0-9０-９,，]*)").unwrap(),
    ]
});
static IMAGE_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+property=["']og:image["'][^>]+content=["']([^"']+)["']"#).unwrap()
});
static DESCRIPTION_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']description["'][^>]+content=["']([^"']+)["']"#).unwrap()
});
static STOCK_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(sold\s*out|売り切れ|完売|在庫切れ|品切れ)").unwrap()
});

/// Walks each field's selector chain (first non-empty match wins), then the
/// field-specific fallback regex over the raw document. Individual missing
/// fields never fail; only a structurally invalid document does.
pub fn parse_fields(body: &str, selectors: &FieldSelectors) -> Result<RawFields, ExtractError> {
    if !body.contains('<') {
        return Err(ExtractError::InvalidDocument);
    }
    let document = Html::parse_document(body);

    let title = select_first(&document, &selectors.title)
        .or_else(|| capture_first(&TITLE_FALLBACK, body));
    let price_text = select_first(&document, &selectors.price).or_else(|| {
        PRICE_FALLBACKS
            .iter()
            .find_map(|pattern| capture_first(pattern, body))
    });
    let stock_text = select_first(&document, &selectors.stock)
        .or_else(|| capture_first(&STOCK_FALLBACK, body));
    let image_url = select_first(&document, &selectors.image)
        .or_else(|| capture_first(&IMAGE_FALLBACK, body));
    let condition_text = select_first(&document, &selectors.condition);
    let rarity = select_first(&document, &selectors.rarity);
    let set_name = select_first(&document, &selectors.set_name);
    let card_number = select_first(&document, &selectors.card_number);
    let description = capture_first(&DESCRIPTION_FALLBACK, body);

    Ok(RawFields {
        title,
        price_text,
        stock_text,
        image_url,
        condition_text,
        rarity,
        set_name,
        card_number,
        description,
    })
}

fn select_first(document: &Html, chain: &[String]) -> Option<String> {
    for raw_selector in chain {
        let Ok(selector) = Selector::parse(raw_selector) else {
            tracing::debug!(selector = %raw_selector, "invalid selector in chain");
            continue;
        };
        for element in document.select(&selector) {
            if let Some(value) = element_value(&element) {
                return Some(value);
            }
        }
    }
    None
}

/// Meta tags and images carry their value in attributes, everything else in
/// text content.
fn element_value(element: &ElementRef) -> Option<String> {
    for attr in ["content", "src"] {
        if let Some(value) = element.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    let text = element.text().collect::<Vec<_>>().join(" ").trim().to_string();
    if text.is_empty() { None } else { Some(text) }
}

fn capture_first(pattern: &Regex, body: &str) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::FieldSelectors;

    fn selectors() -> FieldSelectors {
        FieldSelectors {
            title: vec!["h1.item-name".to_string()],
            price: vec!["span.price".to_string(), "div.price-fallback".to_string()],
            stock: vec!["span.stock".to_string()],
            image: vec!["meta[property='og:image']".to_string()],
            condition: vec!["span.condition".to_string()],
            rarity: vec!["span.rarity".to_string()],
            set_name: vec![],
            card_number: vec![],
        }
    }

    #[test]
    fn test_selector_chain_first_match_wins() {
        let body = r#"<html><body>
            <h1 class="item-name">リザードンex</h1>
            <span class="price">¥4,980</span>
            <div class="price-fallback">¥9,999</div>
        </body></html>"#;

        let fields = parse_fields(body, &selectors()).unwrap();
        assert_eq!(fields.title.as_deref(), Some("リザードンex"));
        assert_eq!(fields.price_text.as_deref(), Some("¥4,980"));
    }

    #[test]
    fn test_selector_fallback_within_chain() {
        let body = r#"<html><body>
            <div class="price-fallback">1,200円</div>
        </body></html>"#;

        let fields = parse_fields(body, &selectors()).unwrap();
        assert_eq!(fields.price_text.as_deref(), Some("1,200円"));
    }

    #[test]
    fn test_regex_fallback_when_selectors_fail() {
        let body = r#"<html><head><title>ピカチュウ - ショップ</title>
            <meta property="og:image" content="https://cdn.example/pika.jpg">
        </head><body><p>販売価格: 350円</p></body></html>"#;

        let fields = parse_fields(body, &selectors()).unwrap();
        assert_eq!(fields.title.as_deref(), Some("ピカチュウ - ショップ"));
        assert_eq!(fields.price_text.as_deref(), Some("350"));
        assert_eq!(fields.image_url.as_deref(), Some("https://cdn.example/pika.jpg"));
    }

    #[test]
    fn test_missing_fields_are_degraded_not_errors() {
        let body = "<html><body><p>nothing useful</p></body></html>";

        let fields = parse_fields(body, &selectors()).unwrap();
        assert!(fields.title.is_none());
        assert!(fields.price_text.is_none());
        let degraded = fields.degraded_fields();
        assert!(degraded.contains(&"title"));
        assert!(degraded.contains(&"price"));
        assert!(degraded.contains(&"rarity"));
    }

    #[test]
    fn test_non_html_body_is_rejected() {
        let result = parse_fields("just some plain text", &selectors());
        assert!(matches!(result, Err(ExtractError::InvalidDocument)));
    }

    #[test]
    fn test_stock_fallback_finds_sold_out_marker() {
        let body = r#"<html><body><div class="unrelated">SOLD OUT</div></body></html>"#;

        let fields = parse_fields(body, &selectors()).unwrap();
        assert_eq!(fields.stock_text.as_deref(), Some("SOLD OUT"));
    }
}
