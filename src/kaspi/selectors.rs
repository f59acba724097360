//! CSS selectors for kaspi.kz HTML parsing.
//!
//! Update this file when the product page markup changes.

use scraper::Selector;
use std::sync::LazyLock;

/// Selectors for the rendered product page.
pub mod product {
    use super::*;

    /// Raw selector string for the product heading (used for browser waits).
    pub const HEADING_CSS: &str = "h1";

    /// Product title.
    pub static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").unwrap());

    /// Any image element.
    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

    /// Image attributes in lookup order: primary, lazy-loaded, data source.
    pub const IMAGE_ATTRS: [&str; 3] = ["src", "data-src", "data-lazy"];
}

/// Selectors for specification blocks.
pub mod specs {
    use super::*;

    /// One structured specification group.
    pub static GROUP: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("div.specifications__group").unwrap());

    /// Group heading inside a specification group.
    pub static GROUP_TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());

    /// Term (key) element.
    pub static TERM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").unwrap());

    /// Definition (value) element.
    pub static DEFINITION: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dd").unwrap());

    /// Loose key elements anywhere on the page.
    pub static LOOSE_TERM: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("dl dt").unwrap());

    /// Loose value elements anywhere on the page.
    pub static LOOSE_DEFINITION: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("dl dd").unwrap());
}

/// Selectors for the rating widget.
pub mod rating {
    use super::*;

    /// Raw selector string for the widget (used for browser waits).
    pub const WIDGET_CSS: &str = ".item__rating";

    /// Rating widget container.
    pub static WIDGET: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".item__rating").unwrap());

    /// Star element whose class list carries the coded rating (`rating _45`).
    pub static STARS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"span[class*="rating _"]"#).unwrap());

    /// Review count text.
    pub static REVIEWS: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(".item__rating-link span").unwrap());
}

/// Breadcrumb selectors, tried in order until one matches.
pub mod breadcrumbs {
    use super::*;

    /// Candidate selectors, most specific first.
    pub const CANDIDATES_CSS: [&str; 6] = [
        "div.breadcrumbs a.breadcrumbs__item",
        ".breadcrumbs a",
        "nav.breadcrumbs a",
        ".breadcrumbs__item",
        "a.breadcrumbs__link",
        ".breadcrumb a",
    ];

    /// Parsed candidates paired with their source text for logging.
    pub static CANDIDATES: LazyLock<Vec<(&'static str, Selector)>> = LazyLock::new(|| {
        CANDIDATES_CSS.iter().map(|css| (*css, Selector::parse(css).unwrap())).collect()
    });

    /// Root labels dropped from the trail (compared lowercase).
    pub const ROOT_LABELS: [&str; 3] = ["главная", "home", "kaspi.kz"];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_compile() {
        let _ = &*product::HEADING;
        let _ = &*product::IMAGE;
        let _ = &*specs::GROUP;
        let _ = &*specs::GROUP_TITLE;
        let _ = &*specs::TERM;
        let _ = &*specs::DEFINITION;
        let _ = &*specs::LOOSE_TERM;
        let _ = &*specs::LOOSE_DEFINITION;
        let _ = &*rating::WIDGET;
        let _ = &*rating::STARS;
        let _ = &*rating::REVIEWS;
        assert_eq!(breadcrumbs::CANDIDATES.len(), breadcrumbs::CANDIDATES_CSS.len());
    }
}
