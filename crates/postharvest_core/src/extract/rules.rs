//! Heuristic vocabulary for card discovery and classification.

/// Category text selectors, tried in order.
pub const CATEGORY_SELECTORS: &[&str] = &[
    ".tag",
    ".post-type",
    ".kicker",
    ".eyebrow",
    ".meta .type",
    ".post-kicker",
];

/// Class names that mark an element as an item card.
pub const CARD_CLASSES: &[&str] = &[
    "category-results-wrapper",
    "blog-grid-card",
    "post-card",
    "card",
    "article",
    "card__content",
];

/// Labels accepted when scanning a card's text for a category word.
pub const CATEGORY_VOCABULARY: &[&str] = &[
    "Product",
    "Engineering",
    "Article",
    "Announcement",
    "Solutions",
    "Customer",
    "Research",
    "Data",
    "Security",
    "Announcements",
];

/// Ancestor levels inspected above an item anchor when looking for its card.
pub const MAX_CARD_DEPTH: usize = 4;

/// Path fragment identifying item anchors on the listing surface.
pub const DEFAULT_ITEM_PATH_MARKER: &str = "/blog/";

/// Explicit rule set handed to the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRules {
    pub item_path_marker: String,
    pub category_selectors: Vec<String>,
    pub card_classes: Vec<String>,
    pub category_vocabulary: Vec<String>,
    pub max_card_depth: usize,
}

impl ExtractionRules {
    /// Default rules with a different item path marker.
    pub fn with_item_path_marker(marker: impl Into<String>) -> Self {
        Self {
            item_path_marker: marker.into(),
            ..Self::default()
        }
    }
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            item_path_marker: DEFAULT_ITEM_PATH_MARKER.to_string(),
            category_selectors: to_owned(CATEGORY_SELECTORS),
            card_classes: to_owned(CARD_CLASSES),
            category_vocabulary: to_owned(CATEGORY_VOCABULARY),
            max_card_depth: MAX_CARD_DEPTH,
        }
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
