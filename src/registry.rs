//! Renderer plugin contract and lookup by name, extension or content.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::context::RenderContext;
use crate::error::Result;
use crate::filetype::SniffedType;
use crate::sanitizer::SanitizerRule;

/// Presentation options of renderers backed by external programs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalRendererOptions {
    /// Output is trusted and skips sanitizing
    pub sanitizer_disabled: bool,
    /// Output is displayed in a sandboxed iframe instead of inline
    pub display_in_iframe: bool,
    /// `sandbox` attribute of the iframe; empty for the default
    pub content_sandbox: String,
}

/// Optional renderer capabilities checked at dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Output runs through the post-processing pipeline
    pub post_process: bool,
    /// [`Renderer::can_render`] recognizes content without an extension
    pub detector: bool,
    pub external: Option<ExternalRendererOptions>,
}

/// A markup format convertible to HTML.
pub trait Renderer: Send + Sync {
    /// Unique renderer name, also used as the markup type.
    fn name(&self) -> &str;

    /// Lowercased file extensions including the dot, e.g. `.md`.
    fn extensions(&self) -> Vec<String>;

    /// Attributes this format needs beyond the default policy.
    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        Vec::new()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Whether the content looks like this format.
    ///
    /// Only consulted when [`Capabilities::detector`] is set.
    fn can_render(&self, file_name: &str, sniffed: SniffedType, prefetch: &[u8]) -> bool {
        let _ = (file_name, sniffed, prefetch);
        false
    }

    /// Converts `input` into raw (unsanitized) HTML written to `output`.
    fn render(
        &self,
        ctx: &mut RenderContext<'_>,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;
}

/// Registered renderers.
///
/// Name and extension conflicts resolve to the last registration.
#[derive(Default)]
pub struct Registry {
    renderers: Vec<Arc<dyn Renderer>>,
    by_name: HashMap<String, Arc<dyn Renderer>>,
    by_extension: HashMap<String, Arc<dyn Renderer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.by_name
            .insert(renderer.name().to_string(), renderer.clone());
        for ext in renderer.extensions() {
            self.by_extension
                .insert(ext.to_lowercase(), renderer.clone());
        }
        self.renderers.push(renderer);
    }

    /// Renderers in registration order.
    pub fn renderers(&self) -> impl Iterator<Item = &Arc<dyn Renderer>> {
        self.renderers.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<dyn Renderer>> {
        self.by_name.get(name)
    }

    /// Looks up the renderer for the extension of `file_name`.
    pub fn by_file_name(&self, file_name: &str) -> Option<&Arc<dyn Renderer>> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        self.by_extension
            .get(&format!(".{}", ext.to_lowercase()))
    }

    /// First detector-capable renderer accepting the content.
    pub fn detect_type(
        &self,
        file_name: &str,
        sniffed: SniffedType,
        prefetch: &[u8],
    ) -> Option<&Arc<dyn Renderer>> {
        self.renderers.iter().find(|r| {
            r.capabilities().detector && r.can_render(file_name, sniffed, prefetch)
        })
    }

    /// Names and sanitizer rules of every registered renderer.
    pub fn sanitizer_rules(&self) -> Vec<(&str, Vec<SanitizerRule>)> {
        self.by_name
            .iter()
            .map(|(name, renderer)| (name.as_str(), renderer.sanitizer_rules()))
            .collect()
    }
}
