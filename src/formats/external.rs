//! Renderers backed by a command declared in settings.

use regex::Regex;
use std::io::{Read, Write};
use std::process::{Command, Stdio};

use super::file_link;
use crate::config::{ContentMode, ExternalRendererSettings};
use crate::context::RenderContext;
use crate::error::{RenderError, Result};
use crate::links::LinkType;
use crate::registry::{Capabilities, ExternalRendererOptions, Renderer};
use crate::sanitizer::SanitizerRule;

/// Sandbox applied to iframes when settings leave it empty.
pub const DEFAULT_CONTENT_SANDBOX: &str = "allow-scripts allow-popups";

/// Pipes the document through a command and takes its stdout as HTML.
///
/// The command runs with `GITKYL_PREFIX_SRC`, `GITKYL_PREFIX_RAW` and
/// `GITKYL_RELATIVE_PATH` set so it can build links of its own.
#[derive(Debug)]
pub struct ExternalRenderer {
    settings: ExternalRendererSettings,
    rules: Vec<SanitizerRule>,
}

impl ExternalRenderer {
    /// Validates the definition and compiles its sanitizer rules.
    ///
    /// Patterns missing `^...$` anchors are anchored.
    ///
    /// # Errors
    ///
    /// Returns error if a rule pattern is not a valid regular expression.
    pub fn new(settings: ExternalRendererSettings) -> Result<Self> {
        let mut rules = Vec::with_capacity(settings.sanitizer_rules.len());
        for rule in &settings.sanitizer_rules {
            let regexp = match &rule.regexp {
                Some(pattern) => Some(Regex::new(&anchored(pattern))?),
                None => None,
            };
            rules.push(SanitizerRule {
                element: leak(&rule.element),
                allow_attr: leak(&rule.allow_attr),
                regexp,
                allow_data_uri_images: false,
            });
        }
        Ok(Self { settings, rules })
    }
}

/// Sanitizer rules live as long as the process, like the built-in ones.
fn leak(s: &str) -> &'static str {
    Box::leak(s.to_lowercase().into_boxed_str())
}

fn anchored(pattern: &str) -> String {
    if pattern.starts_with('^') && pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("^(?:{})$", pattern)
    }
}

impl Renderer for ExternalRenderer {
    fn name(&self) -> &str {
        &self.settings.name
    }

    fn extensions(&self) -> Vec<String> {
        self.settings
            .extensions
            .iter()
            .map(|ext| {
                let ext = ext.to_lowercase();
                if ext.starts_with('.') { ext } else { format!(".{}", ext) }
            })
            .collect()
    }

    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        self.rules.clone()
    }

    fn capabilities(&self) -> Capabilities {
        let sandbox = self.settings.content_sandbox.as_deref().unwrap_or_default();
        Capabilities {
            post_process: self.settings.need_post_process,
            external: Some(ExternalRendererOptions {
                sanitizer_disabled: self.settings.content_mode != ContentMode::Sanitized,
                display_in_iframe: self.settings.content_mode == ContentMode::Iframe,
                content_sandbox: sandbox.to_string(),
            }),
            ..Capabilities::default()
        }
    }

    fn render(&self, ctx: &mut RenderContext<'_>, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let name = &self.settings.name;
        let failed = |message: String| RenderError::External {
            name: name.clone(),
            message,
        };

        let mut source = Vec::new();
        input.read_to_end(&mut source)?;
        ctx.cancel_token().check()?;

        tracing::debug!(renderer = %name, command = %self.settings.command, "Running external renderer");
        let mut child = Command::new(&self.settings.command)
            .args(&self.settings.args)
            .env("GITKYL_PREFIX_SRC", file_link(ctx, LinkType::Default))
            .env("GITKYL_PREFIX_RAW", file_link(ctx, LinkType::Raw))
            .env("GITKYL_RELATIVE_PATH", &ctx.options.relative_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| failed(format!("cannot start {}: {}", self.settings.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // a command that exits without reading closes the pipe early
            if let Err(e) = stdin.write_all(&source)
                && e.kind() != std::io::ErrorKind::BrokenPipe
            {
                return Err(e.into());
            }
        }

        let result = child
            .wait_with_output()
            .map_err(|e| failed(e.to_string()))?;
        if !result.status.success() {
            return Err(failed(format!(
                "{}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !result.stderr.is_empty() {
            tracing::warn!(
                renderer = %name,
                stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                "External renderer wrote to stderr"
            );
        }

        output.write_all(&result.stdout)?;
        Ok(())
    }
}
