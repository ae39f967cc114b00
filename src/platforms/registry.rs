use regex::Regex;

use crate::platforms::{DEFAULT_USER_AGENTS, FieldSelectors, PlatformProfile};

/// Static catalog of platform profiles. Built once at startup from the
/// builtin selector tables; iteration order is stable.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    profiles: Vec<PlatformProfile>,
}

impl PlatformRegistry {
    pub fn builtin() -> Self {
        Self::new(builtin_profiles())
    }

    pub fn new(profiles: Vec<PlatformProfile>) -> Self {
        Self { profiles }
    }

    pub fn get(&self, id: &str) -> Option<&PlatformProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

fn chain(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

fn user_agents() -> Vec<String> {
    DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect()
}

struct ProfileSpec {
    id: &'static str,
    display_name: &'static str,
    base_host: &'static str,
    url_patterns: &'static [&'static str],
    id_patterns: &'static [&'static str],
    selectors: FieldSelectors,
    max_retries: u32,
    timeout_ms: u64,
    request_delay_ms: u64,
}

impl ProfileSpec {
    fn build(self) -> PlatformProfile {
        PlatformProfile {
            id: self.id.to_string(),
            display_name: self.display_name.to_string(),
            base_host: self.base_host.to_string(),
            url_patterns: compile(self.url_patterns),
            id_patterns: compile(self.id_patterns),
            selectors: self.selectors,
            max_retries: self.max_retries,
            timeout_ms: self.timeout_ms,
            request_delay_ms: self.request_delay_ms,
            user_agents: user_agents(),
        }
    }
}

fn builtin_profiles() -> Vec<PlatformProfile> {
    vec![
        ProfileSpec {
            id: "mercari",
            display_name: "メルカリ",
            base_host: "jp.mercari.com",
            url_patterns: &[r"^https://jp\.mercari\.com/item/m\d+"],
            id_patterns: &[r"/item/(m\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h1[data-testid='name']", "h1.item-name"]),
                price: chain(&["div[data-testid='price']", "span.item-price"]),
                stock: chain(&["button[data-testid='checkout-button']", "div.item-sold-out-badge"]),
                image: chain(&["meta[property='og:image']", "img.item-photo"]),
                condition: chain(&["span[data-testid='商品の状態']", "td.item-condition"]),
                rarity: chain(&[]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 10_000,
            request_delay_ms: 1_200,
        }
        .build(),
        ProfileSpec {
            id: "rakuten",
            display_name: "楽天市場",
            base_host: "item.rakuten.co.jp",
            url_patterns: &[r"^https://item\.rakuten\.co\.jp/[\w.-]+/[\w.-]+"],
            id_patterns: &[r"item\.rakuten\.co\.jp/[\w.-]+/([\w.-]+)"],
            selectors: FieldSelectors {
                title: chain(&["span.item_name", "h1.item-name", "span.normal_reserve_item_name"]),
                price: chain(&["span.price2", "div.price--OX_YW", "span#priceCalculationConfig"]),
                stock: chain(&["span.soldout_msg", "div.inventory-information"]),
                image: chain(&["meta[property='og:image']", "img.rakutenLimitedId_ImageMain1-3"]),
                condition: chain(&["span.condition-label"]),
                rarity: chain(&["span.item-rarity"]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 12_000,
            request_delay_ms: 1_000,
        }
        .build(),
        ProfileSpec {
            id: "rakuma",
            display_name: "楽天ラクマ",
            base_host: "fril.jp",
            url_patterns: &[r"^https://(?:item\.)?fril\.jp/(?:item/)?[0-9a-f]+"],
            id_patterns: &[r"fril\.jp/(?:item/)?([0-9a-f]{8,})"],
            selectors: FieldSelectors {
                title: chain(&["h1.item__name", "h1[itemprop='name']"]),
                price: chain(&["p.item__value", "span[itemprop='price']"]),
                stock: chain(&["div.item__sold", "span.item-status"]),
                image: chain(&["meta[property='og:image']", "img.item__image"]),
                condition: chain(&["td[data-label='商品の状態']"]),
                rarity: chain(&[]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 10_000,
            request_delay_ms: 1_200,
        }
        .build(),
        ProfileSpec {
            id: "yahoo_auctions",
            display_name: "ヤフオク!",
            base_host: "auctions.yahoo.co.jp",
            url_patterns: &[r"^https://(?:page\.)?auctions\.yahoo\.co\.jp/jp/auction/[a-z]\d+"],
            id_patterns: &[r"/auction/([a-z]\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h1.ProductTitle__text", "h1.gv-u-fontSize16--giUsr"]),
                price: chain(&["div.Price__value", "span.gv-u-colorTextRed--vSvVx"]),
                stock: chain(&["span.ClosedHeader__tag", "p.ClosedHeader__title"]),
                image: chain(&["meta[property='og:image']", "img.ProductImage__image"]),
                condition: chain(&["dd.ProductDetail__description"]),
                rarity: chain(&[]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 12_000,
            request_delay_ms: 1_500,
        }
        .build(),
        ProfileSpec {
            id: "yahoo_shopping",
            display_name: "Yahoo!ショッピング",
            base_host: "store.shopping.yahoo.co.jp",
            url_patterns: &[r"^https://store\.shopping\.yahoo\.co\.jp/[\w-]+/[\w-]+\.html"],
            id_patterns: &[r"store\.shopping\.yahoo\.co\.jp/[\w-]+/([\w-]+)\.html"],
            selectors: FieldSelectors {
                title: chain(&["h1.elName", "p.mdItemName"]),
                price: chain(&["span.elPriceNumber", "em.mdItemPrice"]),
                stock: chain(&["p.elStockNotice", "span.mdSoldOut"]),
                image: chain(&["meta[property='og:image']", "img.elMainThumbnail"]),
                condition: chain(&["span.elConditionLabel"]),
                rarity: chain(&[]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 12_000,
            request_delay_ms: 1_000,
        }
        .build(),
        ProfileSpec {
            id: "surugaya",
            display_name: "駿河屋",
            base_host: "suruga-ya.jp",
            url_patterns: &[r"^https://(?:www\.)?suruga-ya\.jp/product/detail/\d+"],
            id_patterns: &[r"/product/detail/(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h1#item_title", "h1.title_product"]),
                price: chain(&["p.price_buy", "span.text-price-detail"]),
                stock: chain(&["p.mgnB15.center", "div.out-of-stock-text"]),
                image: chain(&["meta[property='og:image']", "img#imgDisp"]),
                condition: chain(&["span.condition", "div.item-condition"]),
                rarity: chain(&["td.rarity"]),
                set_name: chain(&["td.series"]),
                card_number: chain(&["td.model-number"]),
            },
            max_retries: 2,
            timeout_ms: 15_000,
            request_delay_ms: 2_000,
        }
        .build(),
        ProfileSpec {
            id: "cardrush",
            display_name: "カードラッシュ",
            base_host: "cardrush-pokemon.jp",
            url_patterns: &[r"^https://(?:www\.)?cardrush-pokemon\.jp/product/\d+"],
            id_patterns: &[r"/product/(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h2.goods_name", "h1.product-name"]),
                price: chain(&["span.figure", "p.goods_detail_price"]),
                stock: chain(&["p.stock", "span.soldout"]),
                image: chain(&["meta[property='og:image']", "img.goods_photo"]),
                condition: chain(&["span.goods_spec_condition"]),
                rarity: chain(&["span.goods_spec_rarity", "td.rarity"]),
                set_name: chain(&["td.expansion"]),
                card_number: chain(&["td.card-number"]),
            },
            max_retries: 2,
            timeout_ms: 10_000,
            request_delay_ms: 1_500,
        }
        .build(),
        ProfileSpec {
            id: "hareruya",
            display_name: "晴れる屋",
            base_host: "hareruyamtg.com",
            url_patterns: &[r"^https://(?:www\.)?hareruyamtg\.com/ja/products/detail/\d+"],
            id_patterns: &[r"/products/detail/(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h1.product-detail__name", "h2.name"]),
                price: chain(&["span.product-detail__price", "span.price"]),
                stock: chain(&["p.product-detail__stock", "span.stock_error"]),
                image: chain(&["meta[property='og:image']", "img.product-detail__image"]),
                condition: chain(&["select[name='condition'] option[selected]", "span.condition"]),
                rarity: chain(&["span.product-detail__rarity"]),
                set_name: chain(&["a.product-detail__expansion"]),
                card_number: chain(&[]),
            },
            max_retries: 2,
            timeout_ms: 10_000,
            request_delay_ms: 1_500,
        }
        .build(),
        ProfileSpec {
            id: "yuyutei",
            display_name: "遊々亭",
            base_host: "yuyu-tei.jp",
            url_patterns: &[r"^https://(?:www\.)?yuyu-tei\.jp/sell/[\w-]+/card/\d+"],
            id_patterns: &[r"/card/(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h3.text-primary", "span.card_name"]),
                price: chain(&["strong.text-end", "span.price"]),
                stock: chain(&["span.badge.bg-danger", "span.stock_num"]),
                image: chain(&["meta[property='og:image']", "img.card-image"]),
                condition: chain(&["span.state"]),
                rarity: chain(&["span.rarity", "span.badge.bg-primary"]),
                set_name: chain(&["h4.fs-5"]),
                card_number: chain(&["span.card-number"]),
            },
            max_retries: 2,
            timeout_ms: 10_000,
            request_delay_ms: 1_200,
        }
        .build(),
        ProfileSpec {
            id: "dorasuta",
            display_name: "ドラゴンスター",
            base_host: "dorasuta.jp",
            url_patterns: &[r"^https://(?:www\.)?dorasuta\.jp/[\w-]+/product\?(?:.*&)?product_id=\d+"],
            id_patterns: &[r"[?&]product_id=(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["div.product-name h1", "h1.item-name"]),
                price: chain(&["span.product-price", "div.price"]),
                stock: chain(&["span.product-stock", "p.cart-error"]),
                image: chain(&["meta[property='og:image']", "img.product-main-image"]),
                condition: chain(&["span.product-rank"]),
                rarity: chain(&["dd.product-rarity"]),
                set_name: chain(&["dd.product-series"]),
                card_number: chain(&["dd.product-code"]),
            },
            max_retries: 2,
            timeout_ms: 10_000,
            request_delay_ms: 1_500,
        }
        .build(),
        ProfileSpec {
            id: "magi",
            display_name: "magi",
            base_host: "magi.camp",
            url_patterns: &[r"^https://(?:www\.)?magi\.camp/items/\d+"],
            id_patterns: &[r"/items/(\d+)"],
            selectors: FieldSelectors {
                title: chain(&["h1.item-show__name", "h1.p-item__name"]),
                price: chain(&["div.item-show__price", "span.p-item__price"]),
                stock: chain(&["div.item-show__sold-label", "button.js-purchase-button"]),
                image: chain(&["meta[property='og:image']", "img.item-show__photo"]),
                condition: chain(&["dd.item-show__condition"]),
                rarity: chain(&[]),
                set_name: chain(&[]),
                card_number: chain(&[]),
            },
            max_retries: 3,
            timeout_ms: 10_000,
            request_delay_ms: 1_200,
        }
        .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_size() {
        let registry = PlatformRegistry::builtin();
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn test_lookup_by_id() {
        let registry = PlatformRegistry::builtin();
        let profile = registry.get("surugaya").expect("surugaya profile");
        assert_eq!(profile.base_host, "suruga-ya.jp");
        assert!(registry.get("ebay").is_none());
    }

    #[test]
    fn test_profile_ids_are_unique() {
        let registry = PlatformRegistry::builtin();
        let mut ids: Vec<_> = registry.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry.len());
    }

    #[test]
    fn test_every_profile_has_core_selectors() {
        let registry = PlatformRegistry::builtin();
        for profile in registry.iter() {
            assert!(!profile.url_patterns.is_empty(), "{}", profile.id);
            assert!(!profile.id_patterns.is_empty(), "{}", profile.id);
            assert!(!profile.selectors.title.is_empty(), "{}", profile.id);
            assert!(!profile.selectors.price.is_empty(), "{}", profile.id);
            assert!(!profile.user_agents.is_empty(), "{}", profile.id);
        }
    }

    #[test]
    fn test_id_extraction_per_platform() {
        let registry = PlatformRegistry::builtin();
        let cases = [
            ("mercari", "https://jp.mercari.com/item/m98765432101", "mercari_m98765432101"),
            ("surugaya", "https://suruga-ya.jp/product/detail/603011001", "surugaya_603011001"),
            ("yahoo_auctions", "https://auctions.yahoo.co.jp/jp/auction/x1098765432", "yahoo_auctions_x1098765432"),
            ("dorasuta", "https://dorasuta.jp/pokemon-card/product?product_id=445566", "dorasuta_445566"),
        ];
        for (platform, url, expected) in cases {
            let profile = registry.get(platform).unwrap();
            assert_eq!(profile.extract_product_id(url).as_deref(), Some(expected));
        }
    }
}
