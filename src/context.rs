//! Per-render request state.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::MathDelimiters;
use crate::error::{RenderError, Result};
use crate::helper::{RenderHelper, SimpleDocumentHelper};
use crate::internal::RenderInternal;
use crate::links::{LinkResolver, LinkType};
use crate::markdown::TocEntry;
use crate::render::Markup;

/// Cooperative cancellation flag shared between a caller and a render.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Fails with [`RenderError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How Markdown input is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkdownMode {
    /// Repository files
    #[default]
    Document,
    /// Issues, pull requests and comments
    Comment,
    /// Wiki pages
    Wiki,
}

/// Where the table of contents of a document is placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TocMode {
    #[default]
    None,
    /// Exposed through [`RenderOutputs::sidebar_toc`]
    Sidebar,
    /// Inserted before the document content
    Main,
}

/// Markdown specific render options.
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    pub mode: MarkdownMode,
    /// Overrides the configured math delimiters
    pub math: Option<MathDelimiters>,
    /// Overrides the configured hard line break behavior of `mode`
    pub hard_line_breaks: Option<bool>,
    pub toc: TocMode,
}

/// Options of one render call.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Free-form metadata: `user`, `repo`, `org`, `teams`, ...
    pub metas: BTreeMap<String, String>,
    /// Path of the rendered file, used for renderer lookup by extension
    pub relative_path: String,
    /// Explicit renderer name, taking precedence over `relative_path`
    pub markup_type: Option<String>,
    /// Rewrite resolved links to absolute URLs
    pub use_abs_link: bool,
    /// Host of the current request, e.g. `https://git.example.com`
    pub host_url: Option<String>,
    pub markdown: MarkdownOptions,
}

impl RenderOptions {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metas.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Side results of a render besides the HTML body.
#[derive(Debug, Clone, Default)]
pub struct RenderOutputs {
    /// Headings of the document, in order
    pub toc: Vec<TocEntry>,
    /// Table of contents HTML when placed in the sidebar
    pub sidebar_toc: Option<String>,
}

/// State of exactly one render call.
///
/// Dropping the context runs the helper's clean up, so resources opened
/// by the helper are released on every exit path.
pub struct RenderContext<'m> {
    markup: &'m Markup,
    cancel: CancelToken,
    helper: Box<dyn RenderHelper + 'm>,
    pub options: RenderOptions,
    pub outputs: RenderOutputs,
    pub(crate) internal: RenderInternal,
}

impl<'m> RenderContext<'m> {
    /// Creates a context rendering with `markup` and `helper`.
    pub fn new(markup: &'m Markup, helper: impl RenderHelper + 'm) -> Self {
        Self {
            markup,
            cancel: CancelToken::new(),
            helper: Box::new(helper),
            options: RenderOptions::default(),
            outputs: RenderOutputs::default(),
            internal: RenderInternal::default(),
        }
    }

    /// Creates a context without page specific link resolution.
    pub fn simple(markup: &'m Markup) -> Self {
        Self::new(markup, SimpleDocumentHelper::default())
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn markup(&self) -> &'m Markup {
        self.markup
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Link resolver for the options of this render.
    pub fn link_resolver(&self) -> LinkResolver {
        LinkResolver::new(
            self.markup.settings(),
            self.options.host_url.as_deref(),
            self.options.use_abs_link,
        )
    }

    /// Resolves `link` through the helper.
    pub fn resolve_link(&self, link: &str, preferred: LinkType) -> String {
        self.helper
            .resolve_link(&self.link_resolver(), link, preferred)
    }

    /// Asks the helper whether `id` names an existing commit.
    pub fn is_commit_id_existing(&mut self, id: &str) -> bool {
        self.helper.is_commit_id_existing(&self.cancel, id)
    }
}

impl Drop for RenderContext<'_> {
    fn drop(&mut self) {
        self.helper.clean_up();
    }
}

impl fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("options", &self.options)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
