//! URL normalization against the configured site origin.

use url::Url;

/// Makes `raw` absolute.
///
/// - empty stays empty
/// - `//host/path` gains an `https:` scheme
/// - `http…` passes through untouched
/// - anything else is resolved against `origin`
pub fn normalize_url(raw: &str, origin: &Url) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    if raw.starts_with("//") {
        return format!("https:{raw}");
    }
    if raw.starts_with("http") {
        return raw.to_string();
    }

    match origin.join(raw) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!(
            "{}/{}",
            origin.as_str().trim_end_matches('/'),
            raw.trim_start_matches('/')
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_url;
    use url::Url;

    fn origin() -> Url {
        Url::parse("https://example.com").expect("origin should parse")
    }

    #[test]
    fn protocol_relative_urls_get_https() {
        assert_eq!(
            normalize_url("//cdn.example.com/x.jpg", &origin()),
            "https://cdn.example.com/x.jpg"
        );
    }

    #[test]
    fn root_relative_urls_join_the_origin() {
        assert_eq!(
            normalize_url("/blog/post", &origin()),
            "https://example.com/blog/post"
        );
    }

    #[test]
    fn absolute_urls_pass_through_unchanged() {
        let absolute = "https://other.example.org/a/b?c=1#frag";
        assert_eq!(normalize_url(absolute, &origin()), absolute);
    }

    #[test]
    fn path_relative_urls_resolve_against_origin() {
        assert_eq!(
            normalize_url("blog/post", &origin()),
            "https://example.com/blog/post"
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_url("   ", &origin()), "");
    }
}
