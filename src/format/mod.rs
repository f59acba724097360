//! Output formatting for product records (JSON, table, markdown).

use crate::config::OutputFormat;
use crate::kaspi::models::{Attributes, Offer, RatingInfo, ScrapeResult};

/// Formats scrape results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a single product record.
    pub fn format_result(&self, result: &ScrapeResult) -> String {
        match self.format {
            OutputFormat::Json => json(result, "{}"),
            OutputFormat::Table => self.table_single(result),
            OutputFormat::Markdown => self.markdown_single(result),
        }
    }

    /// Formats several product records.
    pub fn format_results(&self, results: &[ScrapeResult]) -> String {
        if results.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                _ => "No products scraped.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => json(results, "[]"),
            OutputFormat::Table => self.table_products(results),
            OutputFormat::Markdown => results
                .iter()
                .map(|r| self.markdown_single(r))
                .collect::<Vec<_>>()
                .join("\n\n---\n\n"),
        }
    }

    /// Formats an offer list.
    pub fn format_offers(&self, offers: &[Offer]) -> String {
        if offers.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                _ => "No offers found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => json(offers, "[]"),
            OutputFormat::Table => {
                let mut lines = vec![
                    format!("{:<40}  {:>12}", "Seller", "Price"),
                    format!("{:-<40}  {:->12}", "", ""),
                ];
                for offer in offers {
                    lines.push(format!(
                        "{:<40}  {:>12}",
                        truncate(&offer.seller_name, 40),
                        price(offer.price)
                    ));
                }
                lines.push(String::new());
                lines.push(format!("Total: {} offers", offers.len()));
                lines.join("\n")
            }
            OutputFormat::Markdown => {
                let mut lines = vec!["| Seller | Price |".to_string(), "|---|---:|".to_string()];
                for offer in offers {
                    lines.push(format!(
                        "| {} | {} |",
                        escape_cell(&offer.seller_name),
                        price(offer.price)
                    ));
                }
                lines.join("\n")
            }
        }
    }

    /// Formats rating widget values.
    pub fn format_rating(&self, info: &RatingInfo) -> String {
        match self.format {
            OutputFormat::Json => json(info, "{}"),
            OutputFormat::Table => format!(
                "Rating:  {}\nReviews: {}",
                rating(info.rating),
                optional(info.reviews_count)
            ),
            OutputFormat::Markdown => format!(
                "- **Rating:** {}\n- **Reviews:** {}",
                rating(info.rating),
                optional(info.reviews_count)
            ),
        }
    }

    /// Formats a category path.
    pub fn format_category(&self, category: Option<&str>) -> String {
        match self.format {
            OutputFormat::Json => json(&serde_json::json!({ "category": category }), "{}"),
            _ => category.unwrap_or("N/A").to_string(),
        }
    }

    // Table formatting

    fn table_single(&self, result: &ScrapeResult) -> String {
        let mut lines = vec![
            format!("ID:       {}", result.product_id),
            format!("Name:     {}", result.name.as_deref().unwrap_or("N/A")),
            format!("URL:      {}", result.url),
            format!("Category: {}", result.category.as_deref().unwrap_or("N/A")),
            format!("Price:    {}", price_range(result)),
            format!(
                "Rating:   {} ({} reviews)",
                rating(result.rating),
                optional(result.reviews_count)
            ),
            format!("Offers:   {}", result.offers_count),
            format!("Images:   {}", result.images.len()),
            format!("Fetched:  {}", result.fetched_at.to_rfc3339()),
        ];

        if !result.attributes.is_empty() {
            lines.push(String::new());
            lines.push("Attributes:".to_string());
            match &result.attributes {
                Attributes::Grouped(groups) => {
                    for (group, attrs) in groups {
                        lines.push(format!("  [{}]", group));
                        for (key, value) in attrs {
                            lines.push(format!("    {}: {}", key, value));
                        }
                    }
                }
                Attributes::Flat(attrs) => {
                    for (key, value) in attrs {
                        lines.push(format!("  {}: {}", key, value));
                    }
                }
            }
        }

        lines.join("\n")
    }

    fn table_products(&self, results: &[ScrapeResult]) -> String {
        let id_width = 12;
        let price_width = 12;
        let rating_width = 6;
        let offers_width = 6;
        let name_width = 50;

        let mut lines = vec![
            format!(
                "{:<id_width$}  {:>price_width$}  {:>rating_width$}  {:>offers_width$}  {}",
                "ID", "Min price", "Rating", "Offers", "Name"
            ),
            format!(
                "{:-<id_width$}  {:-<price_width$}  {:-<rating_width$}  {:-<offers_width$}  {:-<name_width$}",
                "", "", "", "", ""
            ),
        ];

        for result in results {
            lines.push(format!(
                "{:<id_width$}  {:>price_width$}  {:>rating_width$}  {:>offers_width$}  {}",
                result.product_id,
                price(result.price_min),
                rating(result.rating),
                result.offers_count,
                truncate(result.name.as_deref().unwrap_or("N/A"), name_width)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} products", results.len()));
        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_single(&self, result: &ScrapeResult) -> String {
        let mut lines = vec![
            format!("## {}", result.name.as_deref().unwrap_or(&result.product_id)),
            String::new(),
            format!("- **ID:** {}", result.product_id),
            format!("- **URL:** [View on Kaspi]({})", result.url),
        ];

        if let Some(category) = &result.category {
            lines.push(format!("- **Category:** {}", category));
        }
        lines.push(format!("- **Price:** {}", price_range(result)));
        if result.rating.is_some() || result.reviews_count.is_some() {
            lines.push(format!(
                "- **Rating:** {} ({} reviews)",
                rating(result.rating),
                optional(result.reviews_count)
            ));
        }
        lines.push(format!("- **Offers:** {}", result.offers_count));

        if !result.offers.is_empty() {
            lines.push(String::new());
            lines.push("### Offers".to_string());
            lines.push(String::new());
            lines.push(self.format_offers(&result.offers));
        }

        if !result.attributes.is_empty() {
            lines.push(String::new());
            lines.push("### Attributes".to_string());
            match &result.attributes {
                Attributes::Grouped(groups) => {
                    for (group, attrs) in groups {
                        lines.push(String::new());
                        lines.push(format!("**{}**", group));
                        lines.push(String::new());
                        lines.extend(attrs.iter().map(|(k, v)| format!("- {}: {}", k, v)));
                    }
                }
                Attributes::Flat(attrs) => {
                    lines.push(String::new());
                    lines.extend(attrs.iter().map(|(k, v)| format!("- {}: {}", k, v)));
                }
            }
        }

        lines.join("\n")
    }
}

fn json<T: serde::Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string())
}

fn price(value: Option<f64>) -> String {
    value.map(|p| format!("{:.0} ₸", p)).unwrap_or_else(|| "N/A".to_string())
}

fn price_range(result: &ScrapeResult) -> String {
    match (result.price_min, result.price_max) {
        (Some(lo), Some(hi)) if lo < hi => format!("{:.0} - {:.0} ₸", lo, hi),
        (lo, _) => price(lo),
    }
}

fn rating(value: Option<f64>) -> String {
    value.map(|r| format!("{:.1}", r)).unwrap_or_else(|| "N/A".to_string())
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

/// Shortens to `width` characters, never splitting a character.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kaspi::models::AttributeMap;
    use chrono::{TimeZone, Utc};

    fn make_result() -> ScrapeResult {
        let fetched_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut result = ScrapeResult::new(
            "https://kaspi.kz/shop/p/apple-iphone-15-113137790/?c=750000000",
            "113137790",
            "750000000",
            fetched_at,
        );
        result.name = Some("Apple iPhone 15 128Gb черный".to_string());
        result.category = Some("Электроника > Смартфоны".to_string());
        result.set_offers(vec![
            Offer::new("Sulpak", Some(429_990.0)),
            Offer::new("Technodom", Some(419_990.0)),
        ]);
        result.set_rating(RatingInfo { rating: Some(4.5), reviews_count: Some(312) });
        result.attributes =
            Attributes::Flat(AttributeMap::from([("Цвет".to_string(), "черный".to_string())]));
        result
    }

    #[test]
    fn test_json_single() {
        let output = Formatter::new(OutputFormat::Json).format_result(&make_result());
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["product_id"], "113137790");
        assert_eq!(value["price_min"], 419_990.0);
        assert_eq!(value["offers_count"], 2);
        assert_eq!(value["attributes"]["Цвет"], "черный");
        assert_eq!(value["fetched_at"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_table_single() {
        let output = Formatter::new(OutputFormat::Table).format_result(&make_result());

        assert!(output.contains("ID:       113137790"));
        assert!(output.contains("Category: Электроника > Смартфоны"));
        assert!(output.contains("419990 - 429990 ₸"));
        assert!(output.contains("4.5 (312 reviews)"));
        assert!(output.contains("  Цвет: черный"));
    }

    #[test]
    fn test_markdown_single() {
        let output = Formatter::new(OutputFormat::Markdown).format_result(&make_result());

        assert!(output.starts_with("## Apple iPhone 15 128Gb черный"));
        assert!(output.contains("[View on Kaspi](https://kaspi.kz/shop/p/"));
        assert!(output.contains("| Sulpak | 429990 ₸ |"));
        assert!(output.contains("- Цвет: черный"));
    }

    #[test]
    fn test_missing_fields_render_na() {
        let result = ScrapeResult::new("u", "1", "2", Utc::now());
        let output = Formatter::new(OutputFormat::Table).format_result(&result);

        assert!(output.contains("Name:     N/A"));
        assert!(output.contains("Price:    N/A"));
        assert!(output.contains("Rating:   N/A (N/A reviews)"));
        assert!(!output.contains("Attributes:"));
    }

    #[test]
    fn test_empty_collections() {
        assert_eq!(Formatter::new(OutputFormat::Json).format_results(&[]), "[]");
        assert_eq!(Formatter::new(OutputFormat::Table).format_offers(&[]), "No offers found.");
    }

    #[test]
    fn test_table_products_truncates_by_chars() {
        let mut result = make_result();
        result.name = Some("Смартфон ".repeat(10));

        let output = Formatter::new(OutputFormat::Table).format_results(&[result]);
        assert!(output.contains("..."));
        assert!(output.contains("Total: 1 products"));
    }

    #[test]
    fn test_category_output() {
        let json = Formatter::new(OutputFormat::Json).format_category(None);
        assert!(json.contains("\"category\": null"));

        let plain = Formatter::new(OutputFormat::Table).format_category(Some("A > B"));
        assert_eq!(plain, "A > B");
    }

    #[test]
    fn test_rating_output() {
        let info = RatingInfo { rating: Some(4.8), reviews_count: None };
        let output = Formatter::new(OutputFormat::Table).format_rating(&info);
        assert_eq!(output, "Rating:  4.8\nReviews: N/A");
    }
}
