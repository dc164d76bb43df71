//! Allow-list HTML sanitizing policies.
//!
//! Policies are built once from the rules of every registered renderer and
//! never change afterwards. A value regex that is not anchored with `^...$`
//! is a programming error and panics at build time.

use ammonia::Builder;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use crate::internal::SAFE_ATTR_PREFIX;

static DATA_URI_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(png|jpeg|gif|webp);base64,[A-Za-z0-9+/=]+$")
        .expect("data uri pattern is valid")
});

/// One allowed attribute, optionally constrained by a value pattern.
#[derive(Debug, Clone)]
pub struct SanitizerRule {
    /// Element name; empty for an attribute allowed on every element
    pub element: &'static str,
    pub allow_attr: &'static str,
    pub regexp: Option<Regex>,
    /// Allow `data:image/...` URIs in `img[src]`
    pub allow_data_uri_images: bool,
}

impl SanitizerRule {
    /// Allows `attr` on `element` with any value.
    pub fn attr(element: &'static str, attr: &'static str) -> Self {
        Self {
            element,
            allow_attr: attr,
            regexp: None,
            allow_data_uri_images: false,
        }
    }

    /// Allows `attr` on `element` when its value matches `pattern`.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid regular expression.
    pub fn matching(element: &'static str, attr: &'static str, pattern: &str) -> Self {
        let regexp = match Regex::new(pattern) {
            Ok(regexp) => regexp,
            Err(e) => panic!("invalid sanitizer pattern {:?}: {}", pattern, e),
        };
        Self {
            element,
            allow_attr: attr,
            regexp: Some(regexp),
            allow_data_uri_images: false,
        }
    }

    /// Allows embedded raster images in `img[src]`.
    pub fn data_uri_images() -> Self {
        Self {
            element: "img",
            allow_attr: "src",
            regexp: None,
            allow_data_uri_images: true,
        }
    }
}

/// Value constraints keyed by (element, attribute); element "" is generic.
type Constraints = HashMap<(&'static str, &'static str), Vec<Option<Regex>>>;

/// Frozen set of sanitizing policies.
pub struct Sanitizer {
    default: Builder<'static>,
    description: Builder<'static>,
    per_format: HashMap<String, Builder<'static>>,
}

impl Sanitizer {
    /// Builds the default, description and per-format policies.
    ///
    /// # Panics
    ///
    /// Panics if any rule carries a pattern not anchored with `^...$`.
    pub fn build<'r>(formats: impl IntoIterator<Item = (&'r str, Vec<SanitizerRule>)>) -> Self {
        let defaults = default_rules();
        let mut per_format = HashMap::new();
        for (name, rules) in formats {
            let mut all = defaults.clone();
            all.extend(rules);
            per_format.insert(name.to_string(), document_policy(&all));
        }

        Self {
            default: document_policy(&defaults),
            description: description_policy(),
            per_format,
        }
    }

    /// Sanitizes with the default document policy.
    pub fn sanitize(&self, html: &str) -> String {
        self.default.clean(html).to_string()
    }

    /// Sanitizes with the policy of renderer `format`, or the default one.
    pub fn sanitize_for(&self, format: &str, html: &str) -> String {
        self.per_format
            .get(format)
            .unwrap_or(&self.default)
            .clean(html)
            .to_string()
    }

    /// Sanitizes short free text such as repository descriptions.
    pub fn sanitize_description(&self, html: &str) -> String {
        self.description.clean(html).to_string()
    }
}

fn check_anchored(rule: &SanitizerRule) {
    if let Some(regexp) = &rule.regexp {
        let pattern = regexp.as_str();
        if !pattern.starts_with('^') || !pattern.ends_with('$') {
            panic!(
                "sanitizer rule for {}[{}] must be anchored with ^...$: {:?}",
                rule.element, rule.allow_attr, pattern
            );
        }
    }
}

fn default_rules() -> Vec<SanitizerRule> {
    vec![
        SanitizerRule::matching("", "id", r"^user-content-[\w.-]+$"),
        SanitizerRule::matching("a", "rel", r"^(nofollow|noopener|noreferrer)( (nofollow|noopener|noreferrer))*$"),
        SanitizerRule::matching("a", "class", r"^(ref-issue|mailto|commit|mention)$"),
        SanitizerRule::matching("span", "class", r"^emoji$"),
        SanitizerRule::attr("span", "aria-label"),
        SanitizerRule::matching("pre", "class", r"^code-block( is-loading)?$"),
        SanitizerRule::matching("code", "class", r"^language-[\w#+.-]+( display)?$"),
        SanitizerRule::attr("img", "loading"),
        SanitizerRule::data_uri_images(),
    ]
}

fn constraints(rules: &[SanitizerRule]) -> Constraints {
    let mut constraints: Constraints = HashMap::new();
    for rule in rules {
        check_anchored(rule);
        if rule.allow_data_uri_images {
            continue;
        }
        constraints
            .entry((rule.element, rule.allow_attr))
            .or_default()
            .push(rule.regexp.clone());
    }
    constraints
}

fn document_policy(rules: &[SanitizerRule]) -> Builder<'static> {
    let constraints = constraints(rules);
    let data_uri_images = rules.iter().any(|r| r.allow_data_uri_images);

    let mut builder = Builder::default();
    builder
        .add_tags(&["details", "summary", "div", "span"])
        .link_rel(None)
        .add_generic_attribute_prefixes(&[SAFE_ATTR_PREFIX]);

    for (element, attr) in constraints.keys() {
        if element.is_empty() {
            builder.add_generic_attributes(std::iter::once(*attr));
        } else {
            builder
                .add_tags(std::iter::once(*element))
                .add_tag_attributes(*element, std::iter::once(*attr));
        }
    }
    if data_uri_images {
        builder.add_url_schemes(&["data"]);
    }

    builder.attribute_filter(value_filter(Arc::new(constraints), data_uri_images));
    builder
}

fn description_policy() -> Builder<'static> {
    let rules = vec![
        SanitizerRule::attr("a", "href"),
        SanitizerRule::matching("a", "rel", r"^nofollow$"),
        SanitizerRule::matching("span", "class", r"^emoji$"),
        SanitizerRule::attr("span", "aria-label"),
        SanitizerRule::attr("img", "src"),
        SanitizerRule::attr("img", "alt"),
    ];
    let constraints = constraints(&rules);

    let mut tag_attributes: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
    for (element, attr) in constraints.keys() {
        tag_attributes.entry(*element).or_default().insert(*attr);
    }

    let mut builder = Builder::empty();
    builder
        .tags(HashSet::from([
            "a", "b", "strong", "i", "em", "code", "span", "br", "del", "s", "sub", "sup", "kbd",
            "img",
        ]))
        .tag_attributes(tag_attributes)
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .link_rel(None)
        .add_generic_attribute_prefixes(&[SAFE_ATTR_PREFIX]);
    builder.attribute_filter(value_filter(Arc::new(constraints), false));
    builder
}

fn value_filter(
    constraints: Arc<Constraints>,
    data_uri_images: bool,
) -> impl for<'u> Fn(&str, &str, &'u str) -> Option<Cow<'u, str>> + Send + Sync + 'static {
    move |element, attribute, value| {
        if attribute.starts_with(SAFE_ATTR_PREFIX) {
            return Some(Cow::Borrowed(value));
        }

        if value.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:")) {
            let allowed = data_uri_images
                && element == "img"
                && attribute == "src"
                && DATA_URI_IMAGE.is_match(value);
            return allowed.then_some(Cow::Borrowed(value));
        }

        let specific = constraints.get(&(element, attribute));
        let generic = constraints.get(&("", attribute));
        if specific.is_none() && generic.is_none() {
            return Some(Cow::Borrowed(value));
        }

        let allowed = specific
            .into_iter()
            .chain(generic)
            .flatten()
            .any(|regexp| regexp.as_ref().is_none_or(|r| r.is_match(value)));
        allowed.then_some(Cow::Borrowed(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> Sanitizer {
        Sanitizer::build([(
            "markdown",
            vec![SanitizerRule::matching("li", "class", r"^task-list-item$")],
        )])
    }

    #[test]
    fn test_strips_disallowed_elements_keeping_text() {
        // Act
        let result = sanitizer().sanitize(r#"<p>hello <blink>world</blink><script>x()</script></p>"#);

        // Assert
        assert_eq!(result, "<p>hello world</p>");
    }

    #[test]
    fn test_attribute_value_must_match_rule() {
        // Arrange
        let sanitizer = sanitizer();

        // Act
        let allowed = sanitizer.sanitize(r#"<span class="emoji">x</span>"#);
        let stripped = sanitizer.sanitize(r#"<span class="evil">x</span>"#);

        // Assert
        assert_eq!(allowed, r#"<span class="emoji">x</span>"#);
        assert_eq!(stripped, "<span>x</span>");
    }

    #[test]
    fn test_per_format_rules() {
        // Arrange
        let sanitizer = sanitizer();
        let html = r#"<ul><li class="task-list-item">a</li></ul>"#;

        // Act & Assert
        assert_eq!(sanitizer.sanitize_for("markdown", html), html);
        assert_eq!(sanitizer.sanitize(html), "<ul><li>a</li></ul>");
    }

    #[test]
    fn test_unknown_format_uses_default() {
        // Act
        let result = sanitizer().sanitize_for("nope", r#"<b onclick="x()">b</b>"#);

        // Assert
        assert_eq!(result, "<b>b</b>");
    }

    #[test]
    fn test_safe_attr_prefix_survives() {
        // Act
        let result = sanitizer().sanitize(r#"<span data-attr-class="id:emoji">x</span>"#);

        // Assert
        assert_eq!(result, r#"<span data-attr-class="id:emoji">x</span>"#);
    }

    #[test]
    fn test_data_uri_only_for_images() {
        // Arrange
        let sanitizer = sanitizer();

        // Act
        let image = sanitizer.sanitize(r#"<img src="data:image/png;base64,iVBORw0KGgo=">"#);
        let link = sanitizer.sanitize(r#"<a href="data:text/html;base64,PHNjcmlwdD4=">x</a>"#);

        // Assert
        assert!(image.contains("data:image/png"), "Image data URI kept: {}", image);
        assert!(!link.contains("data:"), "Link data URI removed: {}", link);
    }

    #[test]
    fn test_javascript_links_removed() {
        // Act
        let result = sanitizer().sanitize(r#"<a href="javascript:alert(1)">x</a>"#);

        // Assert
        assert_eq!(result, "<a>x</a>");
    }

    #[test]
    fn test_description_policy_is_strict() {
        // Act
        let result = sanitizer().sanitize_description(
            r#"<h1>Title</h1><a href="https://example.com" rel="nofollow">link</a><table><tr><td>x</td></tr></table>"#,
        );

        // Assert
        assert_eq!(
            result,
            r#"Title<a href="https://example.com" rel="nofollow">link</a>x"#
        );
    }

    #[test]
    #[should_panic(expected = "must be anchored")]
    fn test_unanchored_rule_panics() {
        Sanitizer::build([(
            "bad",
            vec![SanitizerRule::matching("span", "class", r"emoji")],
        )]);
    }
}
