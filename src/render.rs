//! The rendering engine and its entry points.
//!
//! A [`Markup`] holds everything shared between renders: settings, the
//! renderer registry, the frozen sanitizer policies and the host
//! collaborators. It is built once and read-only afterwards, so one engine
//! serves concurrent renders. Each entry point takes a [`RenderContext`]
//! for exactly one call, generates its secure attribute id, and finishes
//! with sanitizing and restoring the protected attributes.

use maud::html;
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, RwLock};

use crate::config::MarkupSettings;
use crate::context::RenderContext;
use crate::dom::escape_html;
use crate::error::{RenderError, Result};
use crate::filetype::sniff;
use crate::formats::{
    self, AsciicastRenderer, ConsoleRenderer, CsvRenderer, DEFAULT_CONTENT_SANDBOX, ExternalRenderer,
};
use crate::links::LinkType;
use crate::markdown::MarkdownRenderer;
use crate::postprocess::{ProcessorSet, UrlPatterns, post_process};
use crate::registry::{Registry, Renderer};
use crate::sanitizer::Sanitizer;

/// Bytes read ahead for content detection.
const PREFETCH_LEN: usize = 1024;

static GLOBAL: RwLock<Option<Arc<Markup>>> = RwLock::new(None);

/// A permalink to a line range, passed to the code preview collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePreviewOptions {
    pub full_url: String,
    pub owner_name: String,
    pub repo_name: String,
    pub commit_id: String,
    pub file_path: String,
    /// First line, 1-based
    pub line_start: usize,
    /// Last line, inclusive
    pub line_stop: usize,
}

/// An issue link, passed to the icon and title collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueIconTitleOptions {
    pub owner_name: String,
    pub repo_name: String,
    pub link_href: String,
    pub issue_index: u64,
}

type MentionableFn = dyn Fn(&RenderContext<'_>, &str) -> bool + Send + Sync;
type CodePreviewFn = dyn Fn(&RenderContext<'_>, &CodePreviewOptions) -> anyhow::Result<String> + Send + Sync;
type IssueIconTitleFn = dyn Fn(&RenderContext<'_>, &IssueIconTitleOptions) -> anyhow::Result<String> + Send + Sync;

/// Host callbacks backing data dependent enrichments.
///
/// Unset callbacks disable their enrichment; the text stays as written.
#[derive(Default)]
pub struct ProcessorHelper {
    /// Whether `@name` refers to an existing user or organization
    pub is_username_mentionable: Option<Box<MentionableFn>>,
    /// HTML preview of a permalinked line range
    pub render_repo_file_code_preview: Option<Box<CodePreviewFn>>,
    /// HTML replacing a full issue URL, typically its state icon and title
    pub render_repo_issue_icon_title: Option<Box<IssueIconTitleFn>>,
}

impl fmt::Debug for ProcessorHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorHelper")
            .field("is_username_mentionable", &self.is_username_mentionable.is_some())
            .field("render_repo_file_code_preview", &self.render_repo_file_code_preview.is_some())
            .field("render_repo_issue_icon_title", &self.render_repo_issue_icon_title.is_some())
            .finish()
    }
}

/// The rendering engine.
pub struct Markup {
    settings: MarkupSettings,
    registry: Registry,
    sanitizer: Sanitizer,
    patterns: UrlPatterns,
    processor_helper: ProcessorHelper,
}

impl Markup {
    /// Builds an engine with the built-in renderers and no collaborators.
    ///
    /// # Errors
    ///
    /// Returns error if the settings contain an invalid pattern.
    pub fn new(settings: MarkupSettings) -> Result<Self> {
        Self::builder(settings).build()
    }

    pub fn builder(settings: MarkupSettings) -> MarkupBuilder {
        MarkupBuilder {
            settings,
            processor_helper: ProcessorHelper::default(),
            renderers: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MarkupSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn processor_helper(&self) -> &ProcessorHelper {
        &self.processor_helper
    }

    pub(crate) fn patterns(&self) -> &UrlPatterns {
        &self.patterns
    }
}

impl fmt::Debug for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Markup")
            .field("settings", &self.settings)
            .field(
                "renderers",
                &self.registry.renderers().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("processor_helper", &self.processor_helper)
            .finish_non_exhaustive()
    }
}

/// Collects collaborators and extra renderers before freezing an engine.
pub struct MarkupBuilder {
    settings: MarkupSettings,
    processor_helper: ProcessorHelper,
    renderers: Vec<Arc<dyn Renderer>>,
}

impl MarkupBuilder {
    pub fn processor_helper(mut self, helper: ProcessorHelper) -> Self {
        self.processor_helper = helper;
        self
    }

    /// Registers an additional renderer after the built-in ones.
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.push(renderer);
        self
    }

    /// Registers every renderer and freezes the sanitizer policies.
    ///
    /// # Errors
    ///
    /// Returns error if a URL pattern or an external renderer rule does not
    /// compile.
    ///
    /// # Panics
    ///
    /// Panics if a built-in or added renderer declares an unanchored rule.
    pub fn build(self) -> Result<Markup> {
        let mut registry = Registry::new();
        registry.register(Arc::new(MarkdownRenderer::new()));
        registry.register(Arc::new(CsvRenderer));
        registry.register(Arc::new(ConsoleRenderer));
        registry.register(Arc::new(AsciicastRenderer));
        for definition in &self.settings.external_renderers {
            registry.register(Arc::new(ExternalRenderer::new(definition.clone())?));
        }
        for renderer in self.renderers {
            registry.register(renderer);
        }

        let sanitizer = Sanitizer::build(registry.sanitizer_rules());
        let patterns = UrlPatterns::new(&self.settings)?;
        tracing::debug!(
            renderers = registry.renderers().count(),
            "Built markup engine"
        );

        Ok(Markup {
            settings: self.settings,
            registry,
            sanitizer,
            patterns,
            processor_helper: self.processor_helper,
        })
    }
}

/// Builds and installs the process-wide engine unless one exists.
///
/// Returns the installed engine either way.
///
/// # Errors
///
/// Returns error if no engine is installed and building one fails.
pub fn init_global(settings: MarkupSettings) -> Result<Arc<Markup>> {
    let mut global = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    if let Some(markup) = global.as_ref() {
        return Ok(markup.clone());
    }
    let markup = Arc::new(Markup::new(settings)?);
    *global = Some(markup.clone());
    Ok(markup)
}

/// Installs `markup` as the process-wide engine.
///
/// Returns `false` and leaves the current engine in place when one is
/// already installed.
pub fn install(markup: Markup) -> bool {
    let mut global = GLOBAL.write().unwrap_or_else(|e| e.into_inner());
    if global.is_some() {
        return false;
    }
    *global = Some(Arc::new(markup));
    true
}

/// The process-wide engine, if installed.
pub fn global() -> Option<Arc<Markup>> {
    GLOBAL.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Removes the process-wide engine.
pub fn reset_for_tests() {
    *GLOBAL.write().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Renders a document with the renderer chosen by the options of `ctx`.
///
/// The renderer is looked up by `markup_type`, then by the extension of
/// `relative_path`, then by content detection.
///
/// # Errors
///
/// Returns error if no renderer matches, the renderer fails, or the render
/// is cancelled.
pub fn render(ctx: &mut RenderContext<'_>, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
    ctx.internal.init();
    let markup = ctx.markup();

    let mut prefetch = Vec::with_capacity(PREFETCH_LEN);
    Read::take(&mut *input, PREFETCH_LEN as u64).read_to_end(&mut prefetch)?;

    let renderer = match &ctx.options.markup_type {
        Some(name) => markup.registry.by_name(name),
        None => markup
            .registry
            .by_file_name(&ctx.options.relative_path)
            .or_else(|| {
                markup
                    .registry
                    .detect_type(&ctx.options.relative_path, sniff(&prefetch), &prefetch)
            }),
    };
    let Some(renderer) = renderer.cloned() else {
        let wanted = ctx
            .options
            .markup_type
            .clone()
            .unwrap_or_else(|| ctx.options.relative_path.clone());
        return Err(RenderError::UnsupportedType(wanted));
    };
    tracing::debug!(renderer = renderer.name(), path = %ctx.options.relative_path, "Rendering document");

    let capabilities = renderer.capabilities();
    if let Some(external) = &capabilities.external
        && external.display_in_iframe
    {
        let sandbox = if external.content_sandbox.is_empty() {
            DEFAULT_CONTENT_SANDBOX
        } else {
            external.content_sandbox.as_str()
        };
        let frame = html! {
            iframe src=(formats::file_link(ctx, LinkType::Raw)) sandbox=(sandbox) class="external-render-iframe" {}
        };
        output.write_all(frame.into_string().as_bytes())?;
        return Ok(());
    }

    let mut buffer = Vec::new();
    let mut source = prefetch.as_slice().chain(&mut *input);
    renderer.render(ctx, &mut source, &mut buffer)?;
    ctx.cancel_token().check()?;
    let mut html = String::from_utf8(buffer)?;

    if capabilities.post_process {
        html = post_process(ctx, &html, &ProcessorSet::DEFAULT)?;
    }
    let sanitizer_disabled = capabilities.external.as_ref().is_some_and(|e| e.sanitizer_disabled);
    if !sanitizer_disabled {
        html = markup.sanitizer.sanitize_for(renderer.name(), &html);
    }

    output.write_all(ctx.internal.finalize(&html).as_bytes())?;
    Ok(())
}

/// Renders a document held in memory.
///
/// # Errors
///
/// See [`render`].
pub fn render_string(ctx: &mut RenderContext<'_>, source: &str) -> Result<String> {
    let mut output = Vec::new();
    render(ctx, &mut source.as_bytes(), &mut output)?;
    Ok(String::from_utf8(output)?)
}

/// Renders a repository description: links and emoji under a strict policy.
///
/// # Errors
///
/// Returns error if the render is cancelled.
pub fn render_description(ctx: &mut RenderContext<'_>, text: &str) -> Result<String> {
    ctx.internal.init();
    let html = post_process(ctx, &escape_html(text), &ProcessorSet::DESCRIPTION)?;
    let html = ctx.markup().sanitizer.sanitize_description(&html);
    Ok(ctx.internal.finalize(&html))
}

/// Renders a plain-text commit message with references, mentions, links
/// and emoji.
///
/// # Errors
///
/// Returns error if the render is cancelled.
pub fn render_commit_message(ctx: &mut RenderContext<'_>, text: &str) -> Result<String> {
    process_text(ctx, text, &ProcessorSet::COMMIT_MESSAGE)
}

/// Renders a plain-text issue or pull request title.
///
/// # Errors
///
/// Returns error if the render is cancelled.
pub fn render_issue_title(ctx: &mut RenderContext<'_>, text: &str) -> Result<String> {
    process_text(ctx, text, &ProcessorSet::ISSUE_TITLE)
}

/// Renders emoji in plain text.
///
/// # Errors
///
/// Returns error if the render is cancelled.
pub fn render_emoji(ctx: &mut RenderContext<'_>, text: &str) -> Result<String> {
    process_text(ctx, text, &ProcessorSet::EMOJI)
}

/// Runs the document processors over HTML rendered elsewhere.
///
/// # Errors
///
/// Returns error if the render is cancelled.
pub fn post_process_default(ctx: &mut RenderContext<'_>, html: &str) -> Result<String> {
    ctx.internal.init();
    let html = post_process(ctx, html, &ProcessorSet::DEFAULT)?;
    let html = ctx.markup().sanitizer.sanitize(&html);
    Ok(ctx.internal.finalize(&html))
}

fn process_text(ctx: &mut RenderContext<'_>, text: &str, set: &ProcessorSet) -> Result<String> {
    ctx.internal.init();
    let html = post_process(ctx, &escape_html(text), set)?;
    let html = ctx.markup().sanitizer.sanitize(&html);
    Ok(ctx.internal.finalize(&html))
}
