//! Display-title cleanup for anchor text.

use once_cell::sync::Lazy;
use regex::Regex;

static CAPITALIZED_RUN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[A-Z][a-z]+.*").ok());

/// Strips path-like prefixes and leading boilerplate from a raw title.
///
/// `Product/2025/12/New Feature Release` becomes `New Feature Release`.
pub fn clean_title(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let candidate = match raw.rsplit('/').next() {
        Some(last) if raw.contains('/') => last.trim(),
        _ => raw,
    };

    if let Some(regex) = CAPITALIZED_RUN.as_ref() {
        if let Some(found) = regex.find(candidate) {
            return found.as_str().trim().to_string();
        }
    }
    candidate.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::clean_title;

    #[test]
    fn keeps_last_path_segment() {
        assert_eq!(
            clean_title("Product/2025/12/New Feature Release"),
            "New Feature Release"
        );
    }

    #[test]
    fn drops_lowercase_boilerplate_prefix() {
        assert_eq!(clean_title("new! Lakehouse Tips"), "Lakehouse Tips");
    }

    #[test]
    fn keeps_trimmed_text_without_capitalized_run() {
        assert_eq!(clean_title("  all lowercase 42  "), "all lowercase 42");
    }

    #[test]
    fn empty_title_stays_empty() {
        assert_eq!(clean_title(""), "");
    }
}
