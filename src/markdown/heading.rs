//! Heading ids.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Prefix of every id generated from user content.
pub const USER_CONTENT_PREFIX: &str = "user-content-";

/// Lowercases word characters and joins runs of them with `-`; `-` is
/// kept, everything else separates runs.
pub fn clean_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut needs_dash = false;
    for c in value.trim().chars() {
        if is_word_char(c) || c == '-' {
            if needs_dash && !result.is_empty() {
                result.push('-');
            }
            needs_dash = false;
            result.extend(c.to_lowercase());
        } else {
            needs_dash = true;
        }
    }
    result
}

/// Same word class the sanitizer accepts in `id` values.
static WORD_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w$").expect("word pattern is valid"));

fn is_word_char(c: char) -> bool {
    WORD_CHAR.is_match(c.encode_utf8(&mut [0; 4]))
}

/// Generates ids unique within one document.
#[derive(Debug, Default)]
pub struct HeadingIds {
    seen: HashSet<String>,
}

impl HeadingIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for a heading with `text`, suffixed `-1`, `-2`, ... on collision.
    pub fn generate(&mut self, text: &str) -> String {
        let base = clean_value(text);
        if base.is_empty() {
            return self.claim("heading");
        }
        self.claim(&base)
    }

    /// Claims an id written explicitly in the document, suffixing it the
    /// same way when an earlier heading already uses it.
    pub fn claim(&mut self, id: &str) -> String {
        if self.seen.insert(id.to_string()) {
            return id.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", id, n);
            if self.seen.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("Hello, World!"), "hello-world");
        assert_eq!(clean_value("  API v2.0 (beta) "), "api-v2-0-beta");
        assert_eq!(clean_value("snake_case and-dash"), "snake_case-and-dash");
        assert_eq!(clean_value("Überblick über"), "überblick-über");
        assert_eq!(clean_value("!!!"), "");
        assert_eq!(clean_value("E = mc²"), "e-mc");
    }

    #[test]
    fn test_duplicates_get_suffixes() {
        // Arrange
        let mut ids = HeadingIds::new();

        // Act
        let generated: Vec<String> = ["Intro", "intro", "Intro!", "intro-1"]
            .iter()
            .map(|t| ids.generate(t))
            .collect();

        // Assert
        assert_eq!(generated, vec!["intro", "intro-1", "intro-2", "intro-1-1"]);
    }

    #[test]
    fn test_empty_heading() {
        let mut ids = HeadingIds::new();
        assert_eq!(ids.generate("?"), "heading");
        assert_eq!(ids.generate(""), "heading-1");
    }

    #[test]
    fn test_explicit_id_after_generated() {
        // Arrange
        let mut ids = HeadingIds::new();

        // Act
        let generated = ids.generate("Foo");
        let explicit = ids.claim("foo");
        let later = ids.generate("foo");

        // Assert
        assert_eq!(generated, "foo");
        assert_eq!(explicit, "foo-1");
        assert_eq!(later, "foo-2");
    }
}
