//! Listing-page extractor with per-item detail-page fallback.

use super::dom::{find_ancestor, first_attr, first_selector_text, has_any_class, stripped_text};
use super::rules::ExtractionRules;
use super::title::clean_title;
use super::urls::normalize_url;
use super::{ExtractError, ExtractResult};
use crate::model::item::{RawItem, UNKNOWN_CATEGORY};
use crate::render::RenderSession;
use log::{debug, info, warn};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const CARD_IMAGE_SELECTOR: &str = "img[data-main-image], img";
const CARD_IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-main-image"];
const OG_IMAGE_SELECTOR: &str = r#"meta[property="og:image"]"#;
const FIRST_IMAGE_SELECTOR: &str = "img";
const HEADING_SELECTOR: &str = "h1";

/// Fields recovered from an item's own page. Empty strings mean "not found".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetailPageData {
    pub category: String,
    pub cover_image_url: String,
    pub title: String,
}

/// Extracts [`RawItem`]s from listing markup.
pub struct ItemExtractor {
    rules: ExtractionRules,
    origin: Url,
    anchor_selector: Selector,
    category_selectors: Vec<Selector>,
    card_image_selector: Selector,
    og_image_selector: Selector,
    first_image_selector: Selector,
    heading_selector: Selector,
}

impl ItemExtractor {
    /// Compiles the rule selectors once. Fails on an unparsable selector or a
    /// relative origin.
    pub fn new(rules: ExtractionRules, origin: &str) -> ExtractResult<Self> {
        let origin = Url::parse(origin.trim())
            .map_err(|_| ExtractError::InvalidOrigin(origin.to_string()))?;

        let anchor_selector = parse_selector(&format!(
            "a[href*='{}']",
            rules.item_path_marker.replace('\'', "\\'")
        ))?;
        let category_selectors = rules
            .category_selectors
            .iter()
            .map(|selector| parse_selector(selector))
            .collect::<ExtractResult<Vec<_>>>()?;

        Ok(Self {
            anchor_selector,
            category_selectors,
            card_image_selector: parse_selector(CARD_IMAGE_SELECTOR)?,
            og_image_selector: parse_selector(OG_IMAGE_SELECTOR)?,
            first_image_selector: parse_selector(FIRST_IMAGE_SELECTOR)?,
            heading_selector: parse_selector(HEADING_SELECTOR)?,
            rules,
            origin,
        })
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Extracts one item per distinct permalink, first anchor wins.
    ///
    /// Items missing a category or image trigger one sequential fallback
    /// visit through `session`. Zero anchors yields an empty list.
    pub fn extract(&self, markup: &str, session: &mut dyn RenderSession) -> Vec<RawItem> {
        let document = Html::parse_document(markup);
        let anchors: Vec<ElementRef<'_>> = document.select(&self.anchor_selector).collect();
        info!(
            "event=extract_anchors module=extract status=ok anchors={}",
            anchors.len()
        );

        let mut seen: HashSet<String> = HashSet::new();
        let mut items = Vec::new();
        let mut fallback_attempts = 0usize;

        for anchor in anchors {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let permalink = normalize_url(href, &self.origin);
            if permalink.is_empty() || !permalink.contains(self.rules.item_path_marker.as_str()) {
                continue;
            }
            if !seen.insert(permalink.clone()) {
                continue;
            }

            let (item, attempted) = self.extract_item(anchor, permalink, session);
            if attempted {
                fallback_attempts += 1;
            }
            items.push(item);
        }

        info!(
            "event=extract_items module=extract status=ok items={} fallback_attempts={}",
            items.len(),
            fallback_attempts
        );
        items
    }

    /// Parses an item page into whatever fallback fields it offers.
    pub fn parse_detail_page(&self, markup: &str) -> DetailPageData {
        let document = Html::parse_document(markup);
        let root = document.root_element();

        let og_image = root
            .select(&self.og_image_selector)
            .find_map(|meta| first_attr(&meta, &["content"]));
        let first_image = || {
            root.select(&self.first_image_selector)
                .next()
                .and_then(|img| first_attr(&img, &["src"]))
        };
        let image = og_image.or_else(first_image).unwrap_or_default();

        DetailPageData {
            category: first_selector_text(root, &self.category_selectors).unwrap_or_default(),
            cover_image_url: normalize_url(image, &self.origin),
            title: root
                .select(&self.heading_selector)
                .next()
                .map(stripped_text)
                .unwrap_or_default(),
        }
    }

    /// Visits `permalink` in an auxiliary view and parses it.
    ///
    /// Returns `None` when the view cannot be opened or its markup cannot be
    /// read; the caller keeps whatever it already resolved.
    pub fn resolve_from_detail_page(
        &self,
        permalink: &str,
        session: &mut dyn RenderSession,
    ) -> Option<DetailPageData> {
        if !session.open_auxiliary_view(permalink) {
            warn!(
                "event=extract_fallback module=extract status=error reason=open_failed url={}",
                permalink
            );
            return None;
        }

        let markup = session.current_markup();
        session.close_auxiliary_view();

        match markup {
            Ok(markup) => {
                debug!(
                    "event=extract_fallback module=extract status=ok url={}",
                    permalink
                );
                Some(self.parse_detail_page(&markup))
            }
            Err(err) => {
                warn!(
                    "event=extract_fallback module=extract status=error reason=markup_failed url={} error={}",
                    permalink, err
                );
                None
            }
        }
    }

    fn extract_item(
        &self,
        anchor: ElementRef<'_>,
        permalink: String,
        session: &mut dyn RenderSession,
    ) -> (RawItem, bool) {
        let mut title = stripped_text(anchor);
        let card = find_ancestor(anchor, self.rules.max_card_depth, |element| {
            has_any_class(element, &self.rules.card_classes)
        });

        let (mut category, mut cover_image_url) = match card {
            Some(card) => (self.category_in_card(card), self.image_in_card(card)),
            None => (String::new(), String::new()),
        };

        let needs_fallback = category.is_empty() || cover_image_url.is_empty();
        if needs_fallback {
            if let Some(detail) = self.resolve_from_detail_page(&permalink, session) {
                if category.is_empty() {
                    category = detail.category;
                }
                if cover_image_url.is_empty() {
                    cover_image_url = detail.cover_image_url;
                }
                if title.is_empty() {
                    title = detail.title;
                }
            }
        }

        if category.is_empty() {
            category = UNKNOWN_CATEGORY.to_string();
        }

        let item = RawItem {
            category,
            title: clean_title(&title),
            cover_image_url,
            permalink,
        };
        (item, needs_fallback)
    }

    fn category_in_card(&self, card: ElementRef<'_>) -> String {
        if let Some(text) = first_selector_text(card, &self.category_selectors) {
            return text;
        }

        let card_text = stripped_text(card);
        let words: HashSet<&str> = card_text.split_whitespace().collect();
        self.rules
            .category_vocabulary
            .iter()
            .find(|label| words.contains(label.as_str()))
            .cloned()
            .unwrap_or_default()
    }

    fn image_in_card(&self, card: ElementRef<'_>) -> String {
        card.select(&self.card_image_selector)
            .next()
            .and_then(|img| first_attr(&img, CARD_IMAGE_ATTRIBUTES))
            .map(|raw| normalize_url(raw, &self.origin))
            .unwrap_or_default()
    }
}

/// Keeps items whose category equals one of `targets`, ignoring case.
/// An empty target list keeps everything.
pub fn filter_by_category(items: Vec<RawItem>, targets: &[String]) -> Vec<RawItem> {
    if targets.is_empty() {
        return items;
    }

    let wanted: Vec<String> = targets
        .iter()
        .map(|target| target.trim().to_lowercase())
        .filter(|target| !target.is_empty())
        .collect();
    if wanted.is_empty() {
        return items;
    }
    let before = items.len();
    let kept: Vec<RawItem> = items
        .into_iter()
        .filter(|item| wanted.contains(&item.category.to_lowercase()))
        .collect();

    info!(
        "event=extract_filter module=extract status=ok categories={} kept={} total={}",
        wanted.join(","),
        kept.len(),
        before
    );
    kept
}

fn parse_selector(selector: &str) -> ExtractResult<Selector> {
    Selector::parse(selector).map_err(|err| ExtractError::InvalidSelector {
        selector: selector.to_string(),
        message: err.to_string(),
    })
}
