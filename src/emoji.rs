//! Emoji lookups by shortcode and by unicode sequence, backed by the gemoji
//! data set of the `emojis` crate.

use emojis::Emoji;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::LazyLock;

static BY_CODEPOINT: LazyLock<HashMap<&'static str, &'static Emoji>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for emoji in emojis::iter() {
        // skin tone variants share the shortcode of the base emoji
        let variants = std::iter::once(emoji).chain(emoji.skin_tones().into_iter().flatten());
        for variant in variants {
            map.entry(variant.as_str()).or_insert(emoji);
            // Text-presentation form without the variation selector
            if let Some(bare) = variant.as_str().strip_suffix('\u{fe0f}') {
                map.entry(bare).or_insert(emoji);
            }
        }
    }
    map
});

/// Matches any known emoji; longer sequences take precedence.
static CODEPOINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut sequences: Vec<&str> = BY_CODEPOINT.keys().copied().collect();
    sequences.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternation = sequences
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .size_limit(64 << 20)
        .build()
        .expect("emoji alternation is valid")
});

/// Canonical shortcode of `emoji`, or its unicode name when it has none.
pub fn name(emoji: &'static Emoji) -> &'static str {
    emoji.shortcode().unwrap_or_else(|| emoji.name())
}

/// Looks up an emoji by shortcode alias, without colons.
pub fn from_alias(alias: &str) -> Option<&'static Emoji> {
    emojis::get_by_shortcode(alias)
}

/// Looks up an emoji by its unicode sequence.
pub fn from_code(code: &str) -> Option<&'static Emoji> {
    BY_CODEPOINT.get(code).copied()
}

/// Byte range of the first known emoji in `text` at or after `start`.
pub fn find_emoji(text: &str, start: usize) -> Option<(usize, usize)> {
    CODEPOINT_PATTERN
        .find_at(text, start)
        .map(|m| (m.start(), m.end()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_alias() {
        assert_eq!(from_alias("beer").map(Emoji::as_str), Some("🍺"));
        assert_eq!(from_alias("+1").map(name), Some("+1"));
        assert_eq!(from_alias("thumbsup").map(name), Some("+1"));
        assert!(from_alias("not_an_emoji").is_none());
    }

    #[test]
    fn test_full_shortcode_set() {
        assert_eq!(from_alias("axe").map(Emoji::as_str), Some("🪓"));
        assert_eq!(from_alias("flamingo").map(Emoji::as_str), Some("🦩"));
        assert_eq!(from_alias("octopus").map(Emoji::as_str), Some("🐙"));
    }

    #[test]
    fn test_from_code_with_and_without_variation_selector() {
        assert_eq!(from_code("❤️").map(name), Some("heart"));
        assert_eq!(from_code("❤").map(name), Some("heart"));
    }

    #[test]
    fn test_from_code_skin_tone() {
        assert_eq!(from_code("👍🏽").map(name), Some("+1"));
    }

    #[test]
    fn test_find_emoji_prefers_full_sequence() {
        // Arrange
        let text = "love ❤️ it";

        // Act
        let found = find_emoji(text, 0);

        // Assert
        assert_eq!(found, Some((5, 5 + "❤️".len())));
    }
}
