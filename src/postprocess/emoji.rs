use regex::Regex;
use std::sync::LazyLock;

use super::{Step, find_bounded};
use crate::context::RenderContext;
use crate::dom::{Attribute, Document, NodeId};
use crate::emoji::{self, find_emoji, from_alias, from_code};

static SHORTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[-+\w]+:").expect("shortcode pattern is valid"));

fn before_shortcode(prev: Option<char>) -> bool {
    prev.is_none_or(|c| !c.is_alphanumeric() && c != ':')
}

fn after_shortcode(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric() && c != ':')
}

fn emoji_span(ctx: &RenderContext<'_>, doc: &mut Document, name: &str) -> NodeId {
    doc.create_element(
        "span",
        vec![
            Attribute::new(ctx.internal.safe_attr("class"), ctx.internal.safe_value("emoji")),
            Attribute::new("aria-label", name),
        ],
    )
}

/// Replaces `:name:` shortcodes with the emoji or a custom emoji image.
pub(crate) fn shortcode(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let Some(caps) = find_bounded(&SHORTCODE, text, start, before_shortcode, after_shortcode) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };
    let name = whole.as_str().trim_matches(':');
    let settings = ctx.markup().settings();

    let node = if settings.custom_emojis.iter().any(|e| e == name) {
        let span = emoji_span(ctx, doc, name);
        let img = doc.create_element(
            "img",
            vec![
                Attribute::new("alt", whole.as_str()),
                Attribute::new(
                    "src",
                    format!("{}/img/emoji/{}.png", settings.static_url_prefix.trim_end_matches('/'), name),
                ),
            ],
        );
        doc.append_child(span, img);
        span
    } else if let Some(found) = from_alias(name) {
        let span = emoji_span(ctx, doc, emoji::name(found));
        let text = doc.create_text(found.as_str());
        doc.append_child(span, text);
        span
    } else {
        // the closing colon may open the next shortcode
        return Step::Skip(whole.end() - 1);
    };

    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node,
    }
}

/// Wraps unicode emoji in a labelled span.
pub(crate) fn codepoint(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let Some((s, e)) = find_emoji(text, start) else {
        return Step::Done;
    };
    let Some(found) = from_code(&text[s..e]) else {
        return Step::Skip(e);
    };

    let span = emoji_span(ctx, doc, emoji::name(found));
    let inner = doc.create_text(&text[s..e]);
    doc.append_child(span, inner);
    Step::Replace {
        start: s,
        end: e,
        node: span,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MarkupSettings;
    use crate::context::RenderContext;
    use crate::postprocess::{ProcessorSet, post_process};
    use crate::render::Markup;

    fn render(html: &str) -> String {
        let markup = Markup::new(MarkupSettings::default()).expect("Should build markup");
        let mut ctx = RenderContext::simple(&markup);
        post_process(&mut ctx, html, &ProcessorSet::EMOJI).expect("Should process")
    }

    #[test]
    fn test_shortcode() {
        assert_eq!(
            render("<p>:beer: time</p>"),
            r#"<p><span class="emoji" aria-label="beer">🍺</span> time</p>"#
        );
    }

    #[test]
    fn test_alias_uses_canonical_name() {
        assert_eq!(
            render("<p>:thumbsup:</p>"),
            r#"<p><span class="emoji" aria-label="+1">👍</span></p>"#
        );
    }

    #[test]
    fn test_custom_emoji_image() {
        assert_eq!(
            render("<p>:gitea:</p>"),
            r#"<p><span class="emoji" aria-label="gitea"><img alt=":gitea:" src="/assets/img/emoji/gitea.png"></span></p>"#
        );
    }

    #[test]
    fn test_unknown_and_embedded_shortcodes_kept() {
        assert_eq!(render("<p>:nope: a:beer: 10:30:45</p>"), "<p>:nope: a:beer: 10:30:45</p>");
    }

    #[test]
    fn test_unknown_shortcode_does_not_hide_next() {
        assert_eq!(
            render("<p>:nope::beer:</p>"),
            "<p>:nope::beer:</p>",
            "Adjacent colons are not a boundary"
        );
        assert_eq!(
            render("<p>:nope: :beer:</p>"),
            r#"<p>:nope: <span class="emoji" aria-label="beer">🍺</span></p>"#
        );
    }

    #[test]
    fn test_codepoint() {
        assert_eq!(
            render("<p>ship 🚀</p>"),
            r#"<p>ship <span class="emoji" aria-label="rocket">🚀</span></p>"#
        );
    }

    #[test]
    fn test_shortcode_outside_common_set() {
        assert_eq!(
            render("<p>:flamingo:</p>"),
            r#"<p><span class="emoji" aria-label="flamingo">🦩</span></p>"#
        );
    }

    #[test]
    fn test_emoji_inside_link_text() {
        assert_eq!(
            render(r#"<p><a href="/x">go :tada:</a></p>"#),
            r#"<p><a href="/x">go <span class="emoji" aria-label="tada">🎉</span></a></p>"#
        );
    }
}
