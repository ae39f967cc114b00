use regex::Regex;
use std::sync::LazyLock;

use crate::models::{Condition, StockStatus};

/// Keywords whose presence in title or stock text marks an item sold out.
/// Matched case-insensitively.
pub const SOLD_OUT_KEYWORDS: &[&str] = &[
    "sold out",
    "soldout",
    "売り切れ",
    "完売",
    "在庫切れ",
    "品切れ",
];

static TRAILING_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:【[^】]*】|\[[^\]]*\])\s*$").unwrap());
static TRAILING_SITE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-|｜]\s+[^-|｜]*$").unwrap());

/// Strips trailing "【…】" / "[…]" decorations and a trailing " - site name"
/// segment. Falls back to the trimmed input when stripping would leave
/// nothing.
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut title = TRAILING_SITE_NAME.replace(trimmed, "").trim().to_string();
    loop {
        let stripped = TRAILING_BRACKETS.replace(&title, "").trim().to_string();
        if stripped == title {
            break;
        }
        title = stripped;
    }
    if title.is_empty() {
        trimmed.to_string()
    } else {
        title
    }
}

/// Parses a formatted price into integer minor units by keeping digits only.
/// Full-width digits are folded to ASCII. Non-numeric input yields 0, not an
/// error: the caller reports it as a degraded field instead.
pub fn parse_price_minor(raw: &str) -> i64 {
    let digits: String = raw
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32),
            _ => None,
        })
        .take(15)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Maps a free-text condition label to the canonical enum by keyword
/// containment. Longer keywords are checked first so "near mint" does not
/// collapse into "mint".
pub fn map_condition(raw: &str) -> Condition {
    let text = raw.to_lowercase();
    let table: &[(&[&str], Condition)] = &[
        (&["near mint", "near-mint", "ニアミント"], Condition::NearMint),
        (&["mint", "新品", "未使用", "未開封"], Condition::Mint),
        (&["excellent", "美品"], Condition::Excellent),
        (&["good", "良好", "良品"], Condition::Good),
        (&["played", "プレイ用", "傷あり", "傷有"], Condition::Played),
        (&["used", "中古"], Condition::Used),
    ];
    for (keywords, condition) in table {
        if keywords.iter().any(|k| text.contains(k)) {
            return *condition;
        }
    }
    Condition::Unknown
}

/// Sold out iff any provided text contains a sold-out keyword.
pub fn infer_stock(texts: &[&str]) -> StockStatus {
    for text in texts {
        let lower = text.to_lowercase();
        if SOLD_OUT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return StockStatus::SoldOut;
        }
    }
    StockStatus::InStock
}
