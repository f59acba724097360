//! HTML parser for rendered kaspi.kz product pages.

use crate::config::AttributeRules;
use crate::kaspi::models::{AttributeMap, Attributes};
use crate::kaspi::selectors::{product, specs};
use regex_lite::Regex;
use scraper::{ElementRef, Html};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::Url;

static PRICE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d[\d\s]*").unwrap());

/// Everything extracted from the product page markup itself.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Product title
    pub name: Option<String>,
    /// Absolute image URLs without query strings
    pub images: BTreeSet<String>,
    /// Structured specification groups in page order
    pub groups: Vec<(String, AttributeMap)>,
    /// Loose key/value pairs found anywhere on the page
    pub fallback: AttributeMap,
}

/// Parser for product page HTML.
pub struct Parser {
    rules: AttributeRules,
}

impl Parser {
    /// Creates a new parser with the given attribute rules.
    pub fn new(rules: AttributeRules) -> Self {
        Self { rules }
    }

    /// Parses name, images, and raw attribute sources from rendered HTML.
    pub fn parse_product_page(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);

        let page = ParsedPage {
            name: self.parse_name(&document),
            images: self.parse_images(&document),
            groups: self.parse_groups(&document),
            fallback: self.parse_fallback(&document),
        };

        debug!(
            "Parsed page: name={:?}, {} images, {} groups, {} loose attributes",
            page.name,
            page.images.len(),
            page.groups.len(),
            page.fallback.len()
        );

        page
    }

    /// Combines structured groups and loose pairs into one attribute set.
    ///
    /// General groups (name carries the general marker) are summaries and are
    /// left out. With at least one remaining group the result is grouped and
    /// loose keys that no remaining group has land in the "other" group.
    /// Otherwise the loose pairs become the whole (flat) attribute set.
    pub fn merge_attributes(
        &self,
        groups: Vec<(String, AttributeMap)>,
        fallback: AttributeMap,
    ) -> Attributes {
        let mut merged: BTreeMap<String, AttributeMap> = BTreeMap::new();
        for (name, attrs) in groups {
            if self.rules.is_general(&name) {
                trace!("Skipping general group {}", name);
                continue;
            }
            merged.entry(name).or_default().extend(attrs);
        }

        if merged.is_empty() {
            return Attributes::Flat(fallback);
        }

        let known: BTreeSet<String> = merged.values().flat_map(|g| g.keys().cloned()).collect();
        let extra: AttributeMap =
            fallback.into_iter().filter(|(key, _)| !known.contains(key)).collect();

        if !extra.is_empty() {
            trace!("Filing {} loose attributes under {}", extra.len(), self.rules.other_group);
            merged.entry(self.rules.other_group.clone()).or_default().extend(extra);
        }

        Attributes::Grouped(merged)
    }

    fn parse_name(&self, document: &Html) -> Option<String> {
        document
            .select(&product::HEADING)
            .next()
            .map(|e| joined_text(e, ""))
            .filter(|name| !name.is_empty())
    }

    fn parse_images(&self, document: &Html) -> BTreeSet<String> {
        document
            .select(&product::IMAGE)
            .filter_map(|img| {
                product::IMAGE_ATTRS
                    .iter()
                    .filter_map(|attr| img.value().attr(attr))
                    .map(str::trim)
                    .find(|src| is_absolute_http(src))
            })
            .map(strip_query)
            .collect()
    }

    fn parse_groups(&self, document: &Html) -> Vec<(String, AttributeMap)> {
        document
            .select(&specs::GROUP)
            .filter_map(|group| {
                let name = group
                    .select(&specs::GROUP_TITLE)
                    .next()
                    .map(|h| joined_text(h, ""))
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| self.rules.default_group.clone());

                let attrs = pairs(group.select(&specs::TERM), group.select(&specs::DEFINITION));
                (!attrs.is_empty()).then_some((name, attrs))
            })
            .collect()
    }

    fn parse_fallback(&self, document: &Html) -> AttributeMap {
        pairs(document.select(&specs::LOOSE_TERM), document.select(&specs::LOOSE_DEFINITION))
    }
}

/// Zips term and definition elements into a map, skipping empty keys.
fn pairs<'a>(
    terms: impl Iterator<Item = ElementRef<'a>>,
    definitions: impl Iterator<Item = ElementRef<'a>>,
) -> AttributeMap {
    terms
        .zip(definitions)
        .map(|(dt, dd)| (joined_text(dt, ""), joined_text(dd, " ")))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Text nodes trimmed, empties dropped, joined with `sep`.
fn joined_text(element: ElementRef, sep: &str) -> String {
    element.text().map(str::trim).filter(|t| !t.is_empty()).collect::<Vec<_>>().join(sep)
}

fn is_absolute_http(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

/// Drops the query string and fragment from a URL.
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}

/// Extracts a price from text such as `"329 990 ₸"`.
pub fn parse_price(text: &str) -> Option<f64> {
    let normalized = text.replace('\u{a0}', " ");
    let digits: String = PRICE_DIGITS
        .find(normalized.trim())?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> Parser {
        Parser::new(AttributeRules::default())
    }

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("329 990 ₸"), Some(329_990.0));
        assert_eq!(parse_price("329\u{a0}990\u{a0}₸"), Some(329_990.0));
        assert_eq!(parse_price("от 1 500 ₸"), Some(1500.0));
        assert_eq!(parse_price("15000"), Some(15000.0));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("нет в наличии"), None);
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("http://x/a.jpg?t=1"), "http://x/a.jpg");
        assert_eq!(strip_query("http://x/a.jpg"), "http://x/a.jpg");
        assert_eq!(strip_query("https://cdn/a.jpg#zoom"), "https://cdn/a.jpg");
        assert_eq!(strip_query("https://cdn/a.jpg?w=1#zoom"), "https://cdn/a.jpg");
        assert_eq!(strip_query("not a url?x=1"), "not a url");
    }

    #[test]
    fn test_images_dedup_query_variants() {
        let html = r#"<html><body>
            <img src="http://x/a.jpg?t=1">
            <img src="http://x/a.jpg?t=2">
        </body></html>"#;

        let page = parser().parse_product_page(html);
        assert_eq!(page.images.len(), 1);
        assert!(page.images.contains("http://x/a.jpg"));
    }

    #[test]
    fn test_images_lazy_attributes_and_filtering() {
        let html = r#"<html><body>
            <img src="data:image/gif;base64,R0lGOD" data-src="https://cdn/b.jpg?w=200">
            <img data-lazy="https://cdn/c.png">
            <img src="/relative/d.jpg">
            <img>
        </body></html>"#;

        let page = parser().parse_product_page(html);
        let images: Vec<_> = page.images.iter().map(String::as_str).collect();
        assert_eq!(images, vec!["https://cdn/b.jpg", "https://cdn/c.png"]);
    }

    #[test]
    fn test_parse_name() {
        let html = "<html><body><h1>\n  Apple iPhone 15 <span>128Gb</span>\n</h1></body></html>";
        let page = parser().parse_product_page(html);
        assert_eq!(page.name.as_deref(), Some("Apple iPhone 15128Gb"));

        let page = parser().parse_product_page("<html><body></body></html>");
        assert!(page.name.is_none());
    }

    #[test]
    fn test_parse_groups_with_default_name() {
        let html = r#"<html><body>
            <div class="specifications__group">
                <h3>Экран</h3>
                <dl><dt>Диагональ</dt><dd>6.1 <span>"</span></dd></dl>
                <dl><dt>Тип</dt><dd>OLED</dd></dl>
            </div>
            <div class="specifications__group">
                <dl><dt>Вес</dt><dd>171 г</dd></dl>
            </div>
            <div class="specifications__group"><h3>Пусто</h3></div>
        </body></html>"#;

        let page = parser().parse_product_page(html);
        assert_eq!(page.groups.len(), 2);
        assert_eq!(page.groups[0].0, "Экран");
        assert_eq!(page.groups[0].1.get("Диагональ").map(String::as_str), Some("6.1 \""));
        assert_eq!(page.groups[1].0, "Общие");
        // loose pairs are collected independently
        assert_eq!(page.fallback.len(), 3);
    }

    #[test]
    fn test_merge_without_groups_is_flat() {
        let fallback = attrs(&[("Цвет", "черный")]);
        let merged = parser().merge_attributes(Vec::new(), fallback.clone());
        assert_eq!(merged, Attributes::Flat(fallback));
    }

    #[test]
    fn test_merge_files_unknown_keys_under_other() {
        let groups = vec![("Экран".to_string(), attrs(&[("Диагональ", "6.1")]))];
        let fallback = attrs(&[("Диагональ", "6.1"), ("Гарантия", "12 мес")]);

        let merged = parser().merge_attributes(groups, fallback);
        let Attributes::Grouped(groups) = merged else {
            panic!("expected grouped attributes");
        };

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Экран"], attrs(&[("Диагональ", "6.1")]));
        assert_eq!(groups["Другие"], attrs(&[("Гарантия", "12 мес")]));
    }

    #[test]
    fn test_merge_same_named_groups_combine() {
        let groups = vec![
            ("Экран".to_string(), attrs(&[("Диагональ", "6.1")])),
            ("Экран".to_string(), attrs(&[("Частота", "60 Гц")])),
        ];

        let merged = parser().merge_attributes(groups, AttributeMap::new());
        let Attributes::Grouped(groups) = merged else {
            panic!("expected grouped attributes");
        };
        assert_eq!(groups["Экран"].len(), 2);
        assert!(!groups.contains_key("Другие"));
    }

    #[test]
    fn test_merge_general_groups_only_is_flat() {
        let html = r#"<html><body>
            <div class="specifications__group">
                <dl><dt>Цвет</dt><dd>черный</dd></dl>
                <dl><dt>Вес</dt><dd>171 г</dd></dl>
            </div>
        </body></html>"#;

        let page = parser().parse_product_page(html);
        assert_eq!(page.groups[0].0, "Общие");

        let merged = parser().merge_attributes(page.groups, page.fallback);
        assert_eq!(merged, Attributes::Flat(attrs(&[("Вес", "171 г"), ("Цвет", "черный")])));
    }

    #[test]
    fn test_merge_skips_general_groups() {
        let groups = vec![
            ("Общие характеристики".to_string(), attrs(&[("Цвет", "черный")])),
            ("Экран".to_string(), attrs(&[("Диагональ", "6.1")])),
        ];
        let fallback = attrs(&[("Цвет", "черный"), ("Диагональ", "6.1")]);

        let merged = parser().merge_attributes(groups, fallback);
        let Attributes::Grouped(groups) = merged else {
            panic!("expected grouped attributes");
        };

        let names: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Другие", "Экран"]);
        assert_eq!(groups["Другие"], attrs(&[("Цвет", "черный")]));
    }
}
