//! Markdown rendering with GitHub Flavored Markdown support.

use comrak::{Arena, Options, format_html, parse_document};
use std::collections::HashSet;
use std::io::{Read, Write};
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use super::frontmatter::{self, RenderConfig};
use super::heading::{HeadingIds, USER_CONTENT_PREFIX};
use super::math;
use super::tasklist::mark_task_items;
use super::toc::{TocEntry, render_toc};
use crate::context::{MarkdownMode, RenderContext, TocMode};
use crate::dom::{Document, NodeId, escape_html, escape_into};
use crate::error::Result;
use crate::links::{LinkType, is_full_url};
use crate::postprocess::has_scheme;
use crate::registry::{Capabilities, Renderer};
use crate::sanitizer::SanitizerRule;

/// Renders Markdown to HTML with GitHub Flavored Markdown extensions.
///
/// Provides tables, strikethrough, autolinks, footnotes and description
/// lists from comrak, plus math, task lists, heading ids, a table of
/// contents and front matter. Fenced code is highlighted by syntect with
/// `hljs-` prefixed CSS classes.
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }

    fn options(hard_line_breaks: bool) -> Options<'static> {
        let mut options = Options::default();

        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;
        options.extension.footnotes = true;
        options.extension.description_lists = true;

        options.parse.smart = true;

        options.render.hardbreaks = hard_line_breaks;
        // output is sanitized after post-processing
        options.render.unsafe_ = true;

        options
    }

    /// Renders Markdown source to unsanitized HTML.
    ///
    /// Fills the heading list and, in sidebar mode, the sidebar table of
    /// contents of `ctx.outputs`.
    ///
    /// # Errors
    ///
    /// Returns error if the front matter is malformed or the render was
    /// cancelled.
    pub fn render_str(&self, ctx: &mut RenderContext<'_>, source: &str) -> Result<String> {
        let settings = ctx.markup().settings();
        let split = frontmatter::split(source);
        let (config, body, body_offset) = match split.yaml.map(frontmatter::parse).transpose()? {
            Some(Some(config)) => (config, split.body, split.offset),
            _ => (RenderConfig::default(), source, 0),
        };

        let delims = ctx.options.markdown.math.unwrap_or(settings.markdown.math);
        let math = math::preprocess(body, delims, &ctx.internal);
        let line_starts = line_starts(&math.text);

        let hard_line_breaks = ctx.options.markdown.hard_line_breaks.unwrap_or(match ctx.options.markdown.mode {
            MarkdownMode::Comment => settings.markdown.enable_hard_line_break_in_comments,
            MarkdownMode::Document | MarkdownMode::Wiki => settings.markdown.enable_hard_line_break_in_documents,
        });
        let options = Self::options(hard_line_breaks);

        let arena = Arena::new();
        let root = parse_document(&arena, &math.text, &options);
        mark_task_items(&arena, root, |line, column| {
            let out = line_starts.get(line.saturating_sub(1)).copied().unwrap_or(0) + column.saturating_sub(1);
            body_offset + math.original_offset(out)
        });

        let mut html = Vec::new();
        format_html(root, &options, &mut html)?;
        let html = String::from_utf8(html)?;
        ctx.cancel_token().check()?;

        let mut doc = Document::parse_fragment(&html);
        let toc = self.transform(ctx, &mut doc);
        let content = doc.to_html();

        let mut out = String::with_capacity(content.len());
        if let Some(lang) = &config.lang {
            out.push_str("<div lang=\"");
            escape_into(&mut out, lang, true);
            out.push_str("\">");
        }
        if let Some(meta) = frontmatter::render_meta(&config) {
            out.push_str(&ctx.internal.protect_safe_attrs(&meta.into_string()));
        }
        let toc_html = render_toc(&toc);
        match ctx.options.markdown.toc {
            TocMode::Main => out.push_str(&toc_html),
            TocMode::Sidebar => ctx.outputs.sidebar_toc = Some(toc_html),
            TocMode::None if config.include_toc => out.push_str(&toc_html),
            TocMode::None => {}
        }
        out.push_str(&content);
        if config.lang.is_some() {
            out.push_str("</div>");
        }

        ctx.outputs.toc = toc;
        Ok(out)
    }

    /// Assigns heading ids, prefixes user ids, marks task items, resolves
    /// links and highlights code.
    fn transform(&self, ctx: &RenderContext<'_>, doc: &mut Document) -> Vec<TocEntry> {
        let mut ids = HeadingIds::new();
        let mut toc = Vec::new();
        let nodes = doc.descendants(doc.root());

        for &id in &nodes {
            let Some(name) = doc.element_name(id).map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    let text = doc.text_content(id).trim().to_string();
                    let slug = match doc.attr(id, "id") {
                        Some(explicit) if !explicit.is_empty() => {
                            let explicit = explicit.trim_start_matches(USER_CONTENT_PREFIX).to_string();
                            ids.claim(&explicit)
                        }
                        _ => ids.generate(&text),
                    };
                    let full = format!("{}{}", USER_CONTENT_PREFIX, slug);
                    doc.set_attr(id, "id", full.clone());
                    toc.push(TocEntry {
                        level: name.as_bytes()[1] - b'0',
                        text,
                        id: full,
                    });
                }
                "a" => self.resolve_attr(ctx, doc, id, "href", LinkType::Default),
                "img" | "video" => self.resolve_attr(ctx, doc, id, "src", LinkType::Media),
                "input" => mark_task_item(doc, id),
                "code" => self.highlight(doc, id),
                _ => {}
            }
            prefix_id(doc, id);
        }

        let known: HashSet<String> = nodes
            .iter()
            .filter_map(|&id| doc.attr(id, "id").map(str::to_owned))
            .collect();
        for &id in &nodes {
            if doc.element_name(id) != Some("a") {
                continue;
            }
            let Some(fragment) = doc.attr(id, "href").and_then(|h| h.strip_prefix('#')) else {
                continue;
            };
            let target = format!("{}{}", USER_CONTENT_PREFIX, fragment);
            if !fragment.starts_with(USER_CONTENT_PREFIX) && known.contains(&target) {
                doc.set_attr(id, "href", format!("#{}", target));
            }
        }

        toc
    }

    fn resolve_attr(&self, ctx: &RenderContext<'_>, doc: &mut Document, id: NodeId, attr: &str, link_type: LinkType) {
        let Some(link) = doc.attr(id, attr) else {
            return;
        };
        if link.is_empty() || link.starts_with('#') || is_full_url(link) || has_scheme(link) {
            return;
        }
        let resolved = ctx.resolve_link(link, link_type);
        doc.set_attr(id, attr, resolved);
    }

    /// Highlights `<pre><code class="language-X">`; math blocks are marked
    /// for client side rendering instead.
    fn highlight(&self, doc: &mut Document, code: NodeId) {
        let Some(pre) = doc.parent(code).filter(|&p| doc.element_name(p) == Some("pre")) else {
            return;
        };
        let Some(language) = doc
            .attr(code, "class")
            .and_then(|c| c.split_whitespace().find_map(|c| c.strip_prefix("language-")))
            .map(str::to_owned)
        else {
            if doc.attr(pre, "class").is_none() {
                doc.set_attr(pre, "class", "code-block");
            }
            return;
        };

        if language == "math" {
            doc.set_attr(pre, "class", "code-block is-loading");
            doc.set_attr(code, "class", "language-math display");
            doc.remove_attr(code, "data-math-style");
            return;
        }
        doc.set_attr(pre, "class", "code-block");

        let source = doc.text_content(code);
        let highlighted = match self.highlight_code(&source, &language) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(language = %language, error = %e, "Failed to highlight code block");
                return;
            }
        };
        for child in doc.children(code) {
            doc.detach(child);
        }
        let raw = doc.create_raw(highlighted);
        doc.append_child(code, raw);
    }

    /// Highlights code with syntect using CSS classes.
    ///
    /// The class prefix is "hljs-" to match highlight.js CSS conventions.
    /// Unknown languages fall back to escaped plain text.
    fn highlight_code(&self, code: &str, language: &str) -> std::result::Result<String, syntect::Error> {
        if code.is_empty() {
            return Ok(String::new());
        }

        let syntax = self
            .syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language));
        let Some(syntax) = syntax else {
            return Ok(escape_html(code));
        };

        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::SpacedPrefixed { prefix: "hljs-" },
        );
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn extensions(&self) -> Vec<String> {
        [".md", ".markdown", ".mdown", ".mkd", ".mkdn", ".livemd"]
            .iter()
            .map(|e| e.to_string())
            .collect()
    }

    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        vec![
            SanitizerRule::matching("li", "class", r"^task-list-item$"),
            SanitizerRule::matching("input", "type", r"^checkbox$"),
            SanitizerRule::attr("input", "checked"),
            SanitizerRule::attr("input", "disabled"),
            SanitizerRule::matching("input", "data-source-position", r"^[0-9]+$"),
            SanitizerRule::matching("span", "class", r"^hljs-[\w.+-]+( hljs-[\w.+-]+)*$"),
            SanitizerRule::matching("sup", "class", r"^footnote-ref$"),
            SanitizerRule::matching("section", "class", r"^footnotes$"),
            SanitizerRule::matching("a", "class", r"^footnote-backref$"),
            SanitizerRule::attr("a", "aria-label"),
            SanitizerRule::attr("div", "lang"),
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            post_process: true,
            ..Capabilities::default()
        }
    }

    fn render(&self, ctx: &mut RenderContext<'_>, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut source = String::new();
        input.read_to_string(&mut source)?;
        let html = self.render_str(ctx, &source)?;
        output.write_all(html.as_bytes())?;
        Ok(())
    }
}

fn line_starts(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Marks the list item holding a generated checkbox as a task item.
fn mark_task_item(doc: &mut Document, input: NodeId) {
    if doc.attr(input, "type") != Some("checkbox") || doc.attr(input, "data-source-position").is_none() {
        return;
    }
    let mut parent = doc.parent(input);
    if parent.is_some_and(|p| doc.element_name(p) == Some("p")) {
        parent = parent.and_then(|p| doc.parent(p));
    }
    if let Some(li) = parent.filter(|&p| doc.element_name(p) == Some("li")) {
        doc.add_class(li, "task-list-item");
    }
}

/// Moves ids written in the document under the user content prefix.
fn prefix_id(doc: &mut Document, id: NodeId) {
    if let Some(value) = doc.attr(id, "id")
        && !value.starts_with(USER_CONTENT_PREFIX)
    {
        let prefixed = format!("{}{}", USER_CONTENT_PREFIX, value);
        doc.set_attr(id, "id", prefixed);
    }
}
