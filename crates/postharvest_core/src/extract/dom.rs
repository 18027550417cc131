//! Small DOM helpers over `scraper` element references.

use scraper::{ElementRef, Selector};

/// Walks up to `max_depth` ancestors of `element` and returns the first
/// element satisfying `predicate`.
///
/// Non-element ancestors (the document node) count towards the depth.
pub fn find_ancestor<'a, P>(element: ElementRef<'a>, max_depth: usize, predicate: P) -> Option<ElementRef<'a>>
where
    P: Fn(&ElementRef<'a>) -> bool,
{
    element
        .ancestors()
        .take(max_depth)
        .filter_map(ElementRef::wrap)
        .find(|ancestor| predicate(ancestor))
}

/// Returns whether any class of `element` appears in `classes`.
pub fn has_any_class(element: &ElementRef<'_>, classes: &[String]) -> bool {
    element
        .value()
        .classes()
        .any(|class| classes.iter().any(|known| known == class))
}

/// Text nodes of `element`, each trimmed, blank ones dropped, space-joined.
pub fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-empty text among matches of `selectors`, tried in order.
pub fn first_selector_text(root: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        root.select(selector)
            .map(stripped_text)
            .find(|text| !text.is_empty())
    })
}

/// First non-empty value among `attributes` on `element`, in priority order.
pub fn first_attr<'a>(element: &ElementRef<'a>, attributes: &[&str]) -> Option<&'a str> {
    attributes.iter().find_map(|name| {
        element
            .value()
            .attr(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::{find_ancestor, first_selector_text, has_any_class, stripped_text};
    use scraper::{ElementRef, Html, Selector};

    const MARKUP: &str = r#"
        <div class="grid">
          <div class="post-card featured">
            <div class="inner">
              <span class="tag">  </span>
              <span class="eyebrow">Engineering</span>
              <h3><a id="target" href="/blog/x">  Fast <em>Joins</em> </a></h3>
            </div>
          </div>
        </div>"#;

    fn target(document: &Html) -> ElementRef<'_> {
        let selector = Selector::parse("#target").expect("selector should parse");
        document
            .select(&selector)
            .next()
            .expect("target anchor should exist")
    }

    #[test]
    fn find_ancestor_respects_depth_bound() {
        let document = Html::parse_fragment(MARKUP);
        let anchor = target(&document);
        let classes = vec!["post-card".to_string()];

        let within = find_ancestor(anchor, 4, |el| has_any_class(el, &classes));
        assert!(within.is_some());

        let too_shallow = find_ancestor(anchor, 2, |el| has_any_class(el, &classes));
        assert!(too_shallow.is_none());
    }

    #[test]
    fn stripped_text_joins_trimmed_pieces() {
        let document = Html::parse_fragment(MARKUP);
        assert_eq!(stripped_text(target(&document)), "Fast Joins");
    }

    #[test]
    fn first_selector_text_skips_blank_matches() {
        let document = Html::parse_fragment(MARKUP);
        let selectors = vec![
            Selector::parse(".tag").expect("selector should parse"),
            Selector::parse(".eyebrow").expect("selector should parse"),
        ];
        assert_eq!(
            first_selector_text(document.root_element(), &selectors).as_deref(),
            Some("Engineering")
        );
    }
}
