//! Removal of summary attribute blocks that repeat individual attributes.

use crate::config::AttributeRules;
use crate::kaspi::models::{AttributeMap, Attributes};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Returns true if `key` occurs in `text`, case-insensitively.
///
/// A plain substring hit counts. Otherwise a single-word key must be one of
/// the whitespace-separated words of the text, and a multi-word key must
/// appear as a phrase after collapsing its internal whitespace.
pub fn key_found_in_text(key: &str, text: &str) -> bool {
    if key.is_empty() || text.is_empty() {
        return false;
    }

    let key = key.to_lowercase();
    let text = text.to_lowercase();

    if text.contains(&key) {
        return true;
    }

    let key_words: Vec<&str> = key.split_whitespace().collect();
    match key_words.as_slice() {
        [] => false,
        [word] => text.split_whitespace().any(|w| w == *word),
        words => text.contains(&words.join(" ")),
    }
}

/// Drops redundant summary entries from an attribute set.
pub struct AttributeDeduplicator {
    rules: AttributeRules,
}

impl AttributeDeduplicator {
    /// Creates a deduplicator with the given rules.
    pub fn new(rules: AttributeRules) -> Self {
        Self { rules }
    }

    /// Returns the attributes with redundant and general entries removed.
    pub fn dedup(&self, mut attributes: Attributes) -> Attributes {
        if attributes.is_empty() {
            return attributes;
        }

        let before = attributes.len();
        let mut doomed: BTreeSet<String> = match &attributes {
            Attributes::Flat(map) => self.redundant_groups(map),
            // group values are maps, never long text
            Attributes::Grouped(_) => BTreeSet::new(),
        };

        doomed.extend(
            attributes
                .keys()
                .into_iter()
                .filter(|key| self.rules.is_general(key))
                .map(str::to_string),
        );

        for key in &doomed {
            attributes.remove(key);
        }

        if !doomed.is_empty() {
            info!(
                "Removed {} duplicate attribute entries ({} -> {}): {:?}",
                doomed.len(),
                before,
                attributes.len(),
                doomed
            );
        }
        attributes
    }

    /// Keys of long-text entries that restate enough individual keys.
    fn redundant_groups(&self, map: &AttributeMap) -> BTreeSet<String> {
        let (groups, individuals): (Vec<_>, Vec<_>) =
            map.iter().partition(|(_, value)| value.chars().count() > self.rules.group_min_chars);

        let individual_keys: BTreeSet<&str> = individuals
            .into_iter()
            .map(|(key, _)| key.trim().trim_end_matches(':').trim())
            .filter(|key| !key.is_empty())
            .collect();

        debug!("{} individual keys, {} group candidates", individual_keys.len(), groups.len());

        groups
            .into_iter()
            .filter(|(group_key, text)| {
                let found: Vec<&str> = individual_keys
                    .iter()
                    .copied()
                    .filter(|key| *key != group_key.as_str() && key_found_in_text(key, text))
                    .collect();

                let redundant = found.len() >= self.rules.min_matching_keys;
                debug!(
                    "Group '{}' mentions {} individual keys{}",
                    group_key,
                    found.len(),
                    if redundant { ", dropping" } else { "" }
                );
                redundant
            })
            .map(|(group_key, _)| group_key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn dedup() -> AttributeDeduplicator {
        AttributeDeduplicator::new(AttributeRules::default())
    }

    fn flat(pairs: &[(&str, &str)]) -> Attributes {
        Attributes::Flat(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn camera_summary() -> String {
        let text = "Main camera with Resolution of 48 megapixels, a bright Aperture that \
                    works well at night, optical Zoom up to five times, plus stabilization \
                    and 4K video recording at sixty frames per second.";
        assert!(text.chars().count() > 100);
        text.to_string()
    }

    #[test]
    fn test_key_found_substring() {
        assert!(key_found_in_text("Zoom", "optical zoom up to 5x"));
        assert!(key_found_in_text("диагональ", "Диагональ экрана 6.1"));
        assert!(!key_found_in_text("Вес", "Размеры 71 x 147 мм"));
    }

    #[test]
    fn test_key_found_phrase_and_empty() {
        assert!(key_found_in_text("Optical   Zoom", "with optical zoom"));
        assert!(!key_found_in_text("Optical Zoom", "zoom optical"));
        assert!(!key_found_in_text("", "text"));
        assert!(!key_found_in_text("key", ""));
        assert!(!key_found_in_text("   ", "some text"));
    }

    #[test]
    fn test_removes_redundant_summary() {
        let summary = camera_summary();
        let attrs = flat(&[
            ("Camera & Multimedia", &summary),
            ("Resolution", "48MP"),
            ("Aperture", "f/1.8"),
            ("Zoom", "5x"),
        ]);

        let result = dedup().dedup(attrs);
        assert_eq!(result.keys(), vec!["Aperture", "Resolution", "Zoom"]);
    }

    #[test]
    fn test_keeps_summary_below_threshold() {
        let summary = camera_summary();
        let attrs = flat(&[("Camera & Multimedia", &summary), ("Resolution", "48MP"), ("Zoom", "5x")]);

        let result = dedup().dedup(attrs.clone());
        assert_eq!(result, attrs);
    }

    #[test]
    fn test_colon_keys_count_as_individuals() {
        let summary = camera_summary();
        let attrs = flat(&[
            ("Camera & Multimedia", &summary),
            ("Resolution:", "48MP"),
            ("Aperture:", "f/1.8"),
            ("Zoom:", "5x"),
        ]);

        let result = dedup().dedup(attrs);
        assert_eq!(result.len(), 3);
        assert!(!result.keys().contains(&"Camera & Multimedia"));
    }

    #[test]
    fn test_general_marker_always_removed() {
        let attrs = flat(&[("Общие характеристики", "да"), ("ОБЩИЙ вес", "1 кг"), ("Цвет", "черный")]);
        let result = dedup().dedup(attrs);
        assert_eq!(result.keys(), vec!["Цвет"]);
    }

    #[test]
    fn test_grouped_only_marker_rule() {
        let mut groups = BTreeMap::new();
        groups.insert("Общие".to_string(), AttributeMap::from([("Вес".into(), "171 г".into())]));
        groups.insert("Экран".to_string(), AttributeMap::from([("Тип".into(), "OLED".into())]));

        let result = dedup().dedup(Attributes::Grouped(groups));
        assert_eq!(result.keys(), vec!["Экран"]);
    }

    #[test]
    fn test_idempotent() {
        let summary = camera_summary();
        let other_summary = "A long description that mentions Resolution only once and otherwise \
                             talks about the packaging, the warranty and the charger in the box.";
        let attrs = flat(&[
            ("Camera & Multimedia", &summary),
            ("Box contents", other_summary),
            ("Resolution", "48MP"),
            ("Aperture", "f/1.8"),
            ("Zoom", "5x"),
            ("Общее", "x"),
        ]);

        let once = dedup().dedup(attrs);
        let twice = dedup().dedup(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.keys(), vec!["Aperture", "Box contents", "Resolution", "Zoom"]);
    }

    #[test]
    fn test_configurable_threshold() {
        let rules = AttributeRules { min_matching_keys: 2, ..AttributeRules::default() };
        let summary = camera_summary();
        let attrs = flat(&[("Camera & Multimedia", &summary), ("Resolution", "48MP"), ("Zoom", "5x")]);

        let result = AttributeDeduplicator::new(rules).dedup(attrs);
        assert_eq!(result.len(), 2);
    }
}
