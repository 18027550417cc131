mod common;

use common::{listing, ScriptedSession};
use postharvest_core::extract::{filter_by_category, ExtractionRules, ItemExtractor};
use postharvest_core::{RawItem, UNKNOWN_CATEGORY};

const ORIGIN: &str = "https://example.com";

fn extractor() -> ItemExtractor {
    ItemExtractor::new(ExtractionRules::default(), ORIGIN).unwrap()
}

#[test]
fn card_supplies_category_and_image_without_fallback() {
    let markup = listing(
        r#"<div class="blog-grid-card">
             <span class="tag">Product</span>
             <img data-src="/img/a.jpg">
             <h3><a href="/blog/post-a">Product/2025/12/New Feature Release</a></h3>
           </div>"#,
    );
    let mut session = ScriptedSession::new(&markup);

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(
        items,
        vec![RawItem {
            category: "Product".to_string(),
            title: "New Feature Release".to_string(),
            cover_image_url: "https://example.com/img/a.jpg".to_string(),
            permalink: "https://example.com/blog/post-a".to_string(),
        }]
    );
    assert!(session.opened.is_empty());
}

#[test]
fn duplicate_permalinks_yield_one_item_and_one_visit() {
    let markup = listing(
        r#"<a href="/blog/post-a">First link</a>
           <a href="https://example.com/blog/post-a">Second link</a>"#,
    );
    let mut session = ScriptedSession::new(&markup);

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "First link");
    assert_eq!(session.opened, vec!["https://example.com/blog/post-a"]);
}

#[test]
fn vocabulary_word_in_card_text_sets_category() {
    let markup = listing(
        r#"<article class="post-card">
             <p>Engineering</p>
             <img src="//cdn.example.com/b.jpg">
             <a href="/blog/post-b">Scaling Pipelines</a>
           </article>"#,
    );
    let mut session = ScriptedSession::new(&markup);

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(items[0].category, "Engineering");
    assert_eq!(items[0].cover_image_url, "https://cdn.example.com/b.jpg");
    assert!(session.opened.is_empty());
}

#[test]
fn detail_page_fills_missing_fields() {
    let markup = listing(r#"<div><a href="/blog/post-c"><img src=""></a></div>"#);
    let detail = r#"<html><head>
          <meta property="og:image" content="/img/c-cover.jpg">
        </head><body>
          <div class="eyebrow">Announcement</div>
          <h1>Launching Things</h1>
          <img src="/img/other.jpg">
        </body></html>"#;
    let mut session =
        ScriptedSession::new(&markup).with_page("https://example.com/blog/post-c", detail);

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(
        items,
        vec![RawItem {
            category: "Announcement".to_string(),
            title: "Launching Things".to_string(),
            cover_image_url: "https://example.com/img/c-cover.jpg".to_string(),
            permalink: "https://example.com/blog/post-c".to_string(),
        }]
    );
    assert_eq!(session.closed, 1);
}

#[test]
fn failed_fallback_keeps_item_with_unknown_category() {
    let markup = listing(r#"<a href="/blog/post-d">Quiet Post</a>"#);
    let mut session = ScriptedSession::new(&markup);

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].category, UNKNOWN_CATEGORY);
    assert_eq!(items[0].cover_image_url, "");
    assert_eq!(items[0].title, "Quiet Post");
    assert_eq!(session.closed, 0);
}

#[test]
fn unreadable_detail_page_is_closed_and_item_kept() {
    let markup = listing(r#"<a href="/blog/post-e">Loud Post</a>"#);
    let mut session =
        ScriptedSession::new(&markup).with_unreadable_page("https://example.com/blog/post-e");

    let items = extractor().extract(&markup, &mut session);

    assert_eq!(session.opened, vec!["https://example.com/blog/post-e"]);
    assert_eq!(session.closed, 1);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Loud Post");
    assert_eq!(items[0].category, UNKNOWN_CATEGORY);
    assert_eq!(items[0].cover_image_url, "");
}

#[test]
fn links_outside_item_path_are_ignored() {
    let markup = listing(r#"<a href="/about">About</a><a href="/careers/blog">Jobs</a>"#);
    let mut session = ScriptedSession::new(&markup);

    assert!(extractor().extract(&markup, &mut session).is_empty());
    assert!(session.opened.is_empty());
}

#[test]
fn category_filter_ignores_case_and_empty_targets_keep_all() {
    let item = |category: &str, permalink: &str| RawItem {
        category: category.to_string(),
        title: "T".to_string(),
        cover_image_url: String::new(),
        permalink: permalink.to_string(),
    };
    let items = vec![item("Product", "a"), item("Engineering", "b"), item("PRODUCT", "c")];

    let kept = filter_by_category(items.clone(), &["product".to_string()]);
    let permalinks: Vec<&str> = kept.iter().map(|i| i.permalink.as_str()).collect();
    assert_eq!(permalinks, vec!["a", "c"]);

    assert_eq!(filter_by_category(items, &[]).len(), 3);
}

#[test]
fn relative_origin_is_rejected() {
    assert!(ItemExtractor::new(ExtractionRules::default(), "/not-absolute").is_err());
}
