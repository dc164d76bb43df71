//! Post-processing of rendered HTML.
//!
//! The rendered fragment is reparsed into a [`Document`] and walked once.
//! Text nodes run through an ordered list of processors; each processor
//! replaces one matched span at a time with a new node, splitting the text
//! node, and resumes strictly after the inserted node. Inserted nodes are
//! never text, so later processors (and later runs over the same output)
//! do not see them again.
//!
//! Subtrees of `code` and `pre` elements and generated emoji spans are not
//! walked. Text inside links only gets emoji processing, except for bare
//! autolinks whose text equals their target, which are re-examined by the
//! URL processors and unwrapped when one of them matches.

mod camo;
mod code_preview;
mod email;
mod emoji;
mod link;
mod mention;
mod reference;

pub use camo::{camo_encode, camo_rewrite};

use regex::{Captures, Regex};

use crate::config::MarkupSettings;
use crate::context::RenderContext;
use crate::dom::{Attribute, Document, NodeData, NodeId};
use crate::error::Result;
use crate::links::{LinkType, is_full_url};

/// Outcome of one processor step on a text node.
pub(crate) enum Step {
    /// Replace `start..end` with `node` and continue after it
    Replace {
        start: usize,
        end: usize,
        node: NodeId,
    },
    /// Candidate rejected; continue scanning this node at the offset
    Skip(usize),
    /// No further matches in this node
    Done,
}

/// A text processor: finds the next candidate in `text` at or after
/// `start` and optionally builds its replacement.
pub(crate) type Processor = fn(&mut RenderContext<'_>, &mut Document, &str, usize) -> Step;

/// Processors applied by one entry point.
#[derive(Clone, Copy)]
pub struct ProcessorSet {
    text: &'static [Processor],
    autolink: &'static [Processor],
}

const EMOJI_PROCESSORS: &[Processor] = &[emoji::shortcode, emoji::codepoint];

impl ProcessorSet {
    /// Rendered documents and comments.
    pub const DEFAULT: Self = Self {
        text: &[
            code_preview::process,
            reference::full_issue_url,
            reference::full_commit_url,
            mention::process,
            reference::issue_ref,
            reference::commit_sha,
            email::process,
            emoji::shortcode,
            emoji::codepoint,
        ],
        autolink: &[
            code_preview::process,
            reference::full_issue_url,
            reference::full_commit_url,
        ],
    };

    /// Plain-text commit messages.
    pub const COMMIT_MESSAGE: Self = Self {
        text: &[
            reference::full_issue_url,
            reference::full_commit_url,
            link::process,
            mention::process,
            reference::issue_ref,
            reference::commit_sha,
            email::process,
            emoji::shortcode,
            emoji::codepoint,
        ],
        autolink: &[reference::full_issue_url, reference::full_commit_url],
    };

    /// Short plain-text descriptions.
    pub const DESCRIPTION: Self = Self {
        text: &[link::process, emoji::shortcode, emoji::codepoint],
        autolink: &[],
    };

    /// Issue and pull request titles.
    pub const ISSUE_TITLE: Self = Self {
        text: &[
            reference::issue_ref,
            reference::commit_sha,
            emoji::shortcode,
            emoji::codepoint,
        ],
        autolink: &[],
    };

    /// Emoji only.
    pub const EMOJI: Self = Self {
        text: EMOJI_PROCESSORS,
        autolink: &[],
    };
}

/// Patterns depending on the application URL, compiled once per engine.
#[derive(Debug)]
pub(crate) struct UrlPatterns {
    pub(crate) full_issue: Regex,
    pub(crate) full_commit: Regex,
    pub(crate) code_preview: Regex,
}

impl UrlPatterns {
    pub(crate) fn new(settings: &MarkupSettings) -> Result<Self> {
        let app = regex::escape(&settings.app_url);
        Ok(Self {
            full_issue: Regex::new(&format!(
                r"{app}([\w.-]+)/([\w.-]+)/(?:issues|pulls)/(\d+)(#[\w-]+)?"
            ))?,
            full_commit: Regex::new(&format!(
                r"{app}([\w.-]+)/([\w.-]+)/commit/([0-9a-f]{{7,64}})(/[\w./-]*[\w-])?(#[\w-]+)?"
            ))?,
            code_preview: Regex::new(&format!(
                r"{app}([\w.-]+)/([\w.-]+)/src/commit/([0-9a-f]{{7,64}})/(\S+)#L(\d+)(?:-L(\d+))?"
            ))?,
        })
    }
}

/// Runs `set` over an HTML fragment and returns the rewritten fragment.
///
/// # Errors
///
/// Returns error if the render was cancelled.
pub fn post_process(ctx: &mut RenderContext<'_>, html: &str, set: &ProcessorSet) -> Result<String> {
    ctx.cancel_token().check()?;
    let mut doc = Document::parse_fragment(html);
    let root = doc.root();
    visit_children(ctx, &mut doc, root, set, set.text);
    ctx.cancel_token().check()?;
    Ok(doc.to_html())
}

fn visit_children(
    ctx: &mut RenderContext<'_>,
    doc: &mut Document,
    parent: NodeId,
    set: &ProcessorSet,
    procs: &[Processor],
) {
    let mut child = doc.first_child(parent);
    while let Some(id) = child {
        let next = doc.next_sibling(id);
        match doc.data(id) {
            NodeData::Text(_) => process_text_node(ctx, doc, id, procs),
            NodeData::Element { .. } => visit_element(ctx, doc, id, set, procs),
            _ => {}
        }
        child = next;
    }
}

fn visit_element(
    ctx: &mut RenderContext<'_>,
    doc: &mut Document,
    id: NodeId,
    set: &ProcessorSet,
    procs: &[Processor],
) {
    let Some(name) = doc.element_name(id).map(str::to_owned) else {
        return;
    };
    rewrite_attributes(ctx, doc, id, &name);

    match name.as_str() {
        "code" | "pre" => {}
        "span" if is_emoji_span(ctx, doc, id) => {}
        "a" => {
            if !set.autolink.is_empty() && is_bare_autolink(doc, id) {
                process_autolink(ctx, doc, id, set.autolink);
            }
            if doc.parent(id).is_some() {
                visit_children(ctx, doc, id, set, EMOJI_PROCESSORS);
            }
        }
        _ => visit_children(ctx, doc, id, set, procs),
    }
}

fn is_emoji_span(ctx: &RenderContext<'_>, doc: &Document, id: NodeId) -> bool {
    doc.has_class(id, "emoji")
        || doc.attr(id, &ctx.internal.safe_attr("class")) == Some(ctx.internal.safe_value("emoji").as_str())
}

fn is_bare_autolink(doc: &Document, id: NodeId) -> bool {
    let children = doc.children(id);
    let [only] = children.as_slice() else {
        return false;
    };
    match (doc.text(*only), doc.attr(id, "href")) {
        (Some(text), Some(href)) => text == href,
        _ => false,
    }
}

/// Re-examines a bare autolink; unwraps it when a URL processor matched.
fn process_autolink(ctx: &mut RenderContext<'_>, doc: &mut Document, id: NodeId, procs: &[Processor]) {
    let Some(text_node) = doc.first_child(id) else {
        return;
    };
    process_text_node(ctx, doc, text_node, procs);

    let children = doc.children(id);
    let unchanged = children.len() == 1 && doc.text(children[0]).is_some();
    if unchanged {
        return;
    }
    for child in children {
        doc.insert_before(id, child);
    }
    doc.detach(id);
}

/// Runs every processor over `node` and the siblings inserted from it.
fn process_text_node(ctx: &mut RenderContext<'_>, doc: &mut Document, node: NodeId, procs: &[Processor]) {
    let stop = doc.next_sibling(node);
    for processor in procs {
        run_processor(ctx, doc, node, stop, *processor);
    }
}

fn run_processor(
    ctx: &mut RenderContext<'_>,
    doc: &mut Document,
    node: NodeId,
    stop: Option<NodeId>,
    processor: Processor,
) {
    let mut current = Some(node);
    let mut start = 0;
    while let Some(id) = current {
        if Some(id) == stop {
            break;
        }
        let Some(text) = doc.text(id).map(str::to_owned) else {
            current = doc.next_sibling(id);
            start = 0;
            continue;
        };

        match processor(ctx, doc, &text, start) {
            Step::Replace { start: s, end, node } => {
                doc.split_text(id, s, end, node);
                current = doc.next_sibling(node);
                start = 0;
            }
            Step::Skip(resume) if resume > start && resume <= text.len() => start = resume,
            Step::Skip(_) | Step::Done => {
                current = doc.next_sibling(id);
                start = 0;
            }
        }
    }
}

/// Resolves relative link targets and proxies media sources.
fn rewrite_attributes(ctx: &RenderContext<'_>, doc: &mut Document, id: NodeId, name: &str) {
    match name {
        "a" => {
            if let Some(href) = doc.attr(id, "href").filter(|h| is_relative_link(h)) {
                let resolved = ctx.resolve_link(href, LinkType::Default);
                doc.set_attr(id, "href", resolved);
            }
        }
        "img" | "video" => {
            let Some(src) = doc.attr(id, "src").map(str::to_owned) else {
                return;
            };
            let mut src = src;
            if is_relative_link(&src) {
                src = ctx.resolve_link(&src, LinkType::Media);
            }
            let src = camo_rewrite(ctx.markup().settings(), &src);
            doc.set_attr(id, "src", src);
        }
        _ => {}
    }
}

/// Whether `link` is relative to the current page: not rooted, not an
/// anchor and without a scheme.
fn is_relative_link(link: &str) -> bool {
    !link.is_empty()
        && !link.starts_with('#')
        && !link.starts_with('/')
        && !is_full_url(link)
        && !has_scheme(link)
}

/// Whether `link` starts with a URL scheme such as `data:`.
pub(crate) fn has_scheme(link: &str) -> bool {
    match link.find(':') {
        Some(pos) if pos > 0 => {
            let scheme = &link[..pos];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Finds the first match of `pattern` at or after `start` whose
/// surrounding characters pass the boundary checks.
pub(crate) fn find_bounded<'t>(
    pattern: &Regex,
    text: &'t str,
    start: usize,
    before: fn(Option<char>) -> bool,
    after: fn(&str) -> bool,
) -> Option<Captures<'t>> {
    let mut pos = start;
    while pos <= text.len() {
        let caps = pattern.captures_at(text, pos)?;
        let whole = caps.get(0)?;
        let prev = text[..whole.start()].chars().next_back();
        if before(prev) && after(&text[whole.end()..]) {
            return Some(caps);
        }
        pos = whole.start()
            + text[whole.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
    }
    None
}

/// Start of text, whitespace or an opening bracket.
pub(crate) fn opens_token(prev: Option<char>) -> bool {
    prev.is_none_or(|c| c.is_whitespace() || matches!(c, '(' | '['))
}

/// End of text, whitespace, a closing bracket, or sentence punctuation
/// followed by whitespace or the end.
pub(crate) fn closes_token(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_whitespace() || matches!(c, ')' | ']') => true,
        Some(':' | ',' | '.' | ';' | '!' | '?') => chars.next().is_none_or(char::is_whitespace),
        _ => false,
    }
}

/// Creates `<a href>` with a text child and an optional protected class.
pub(crate) fn create_link(
    ctx: &RenderContext<'_>,
    doc: &mut Document,
    href: &str,
    text: &str,
    class: Option<&str>,
) -> NodeId {
    let mut attrs = vec![Attribute::new("href", href)];
    if let Some(class) = class {
        attrs.push(Attribute::new(
            ctx.internal.safe_attr("class"),
            ctx.internal.safe_value(class),
        ));
    }
    let link = doc.create_element("a", attrs);
    let text = doc.create_text(text);
    doc.append_child(link, text);
    link
}

/// Creates `<a href><code>text</code></a>`.
pub(crate) fn create_code_link(doc: &mut Document, href: &str, text: &str) -> NodeId {
    let link = doc.create_element("a", vec![Attribute::new("href", href)]);
    let code = doc.create_element("code", Vec::new());
    let text = doc.create_text(text);
    doc.append_child(code, text);
    doc.append_child(link, code);
    link
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Markup;

    fn markup() -> Markup {
        Markup::new(MarkupSettings::default()).expect("Should build markup")
    }

    #[test]
    fn test_closes_token() {
        assert!(closes_token(""));
        assert!(closes_token(" and"));
        assert!(closes_token(")"));
        assert!(closes_token("."));
        assert!(closes_token(", next"));
        assert!(!closes_token(".com"));
        assert!(!closes_token("abc"));
    }

    #[test]
    fn test_relative_links() {
        assert!(is_relative_link("docs/a.md"));
        assert!(is_relative_link("./a.md"));
        assert!(!is_relative_link("/root"));
        assert!(!is_relative_link("#anchor"));
        assert!(!is_relative_link("https://example.com"));
        assert!(!is_relative_link("mailto:a@b.c"));
        assert!(!is_relative_link("javascript:alert(1)"));
    }

    #[test]
    fn test_code_and_pre_not_processed() {
        // Arrange
        let markup = markup();
        let mut ctx = RenderContext::simple(&markup);

        // Act
        let html = post_process(
            &mut ctx,
            "<pre><code>:beer:</code></pre><p><code>:beer:</code></p>",
            &ProcessorSet::EMOJI,
        )
        .expect("Should process");

        // Assert
        assert_eq!(html, "<pre><code>:beer:</code></pre><p><code>:beer:</code></p>");
    }

    #[test]
    fn test_processing_is_idempotent() {
        // Arrange
        let markup = markup();
        let mut ctx = RenderContext::simple(&markup);
        let input = "<p>:tada: shipped 🚀, mail dev@example.com :+1:</p>";

        // Act
        let once = post_process(&mut ctx, input, &ProcessorSet::DEFAULT).expect("Should process");
        let twice = post_process(&mut ctx, &once, &ProcessorSet::DEFAULT).expect("Should process");

        // Assert
        assert_eq!(once, twice);
        assert!(once.contains(r#"aria-label="tada""#));
        assert!(once.contains(r#"aria-label="rocket""#));
        assert!(once.contains("mailto:dev@example.com"));
    }

    #[test]
    fn test_relative_image_resolved_as_media() {
        // Arrange
        let markup = markup();
        let mut ctx = RenderContext::new(
            &markup,
            crate::helper::SimpleDocumentHelper::new("/docs"),
        );

        // Act
        let html = post_process(&mut ctx, r#"<img src="logo.png">"#, &ProcessorSet::DEFAULT)
            .expect("Should process");

        // Assert
        assert_eq!(html, r#"<img src="/docs/logo.png">"#);
    }

    #[test]
    fn test_cancelled_render_fails() {
        // Arrange
        let markup = markup();
        let mut ctx = RenderContext::simple(&markup);
        ctx.cancel_token().cancel();

        // Act
        let result = post_process(&mut ctx, "<p>x</p>", &ProcessorSet::DEFAULT);

        // Assert
        assert!(result.is_err());
    }
}
