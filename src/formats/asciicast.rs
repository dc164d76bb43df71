//! Terminal recordings played by asciinema in the browser.

use maud::html;
use std::io::{Read, Write};

use super::file_link;
use crate::context::RenderContext;
use crate::error::Result;
use crate::links::LinkType;
use crate::registry::Renderer;
use crate::sanitizer::SanitizerRule;

/// Emits a player container pointing at the raw recording.
///
/// The recording itself is fetched by the client, so the input is not read.
#[derive(Debug, Default)]
pub struct AsciicastRenderer;

impl Renderer for AsciicastRenderer {
    fn name(&self) -> &str {
        "asciicast"
    }

    fn extensions(&self) -> Vec<String> {
        vec![".cast".to_string()]
    }

    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        vec![SanitizerRule::attr("div", "data-asciinema-player-src")]
    }

    fn render(&self, ctx: &mut RenderContext<'_>, _input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let src = file_link(ctx, LinkType::Raw);
        let container = html! {
            div class="asciinema-player-container" data-asciinema-player-src=(src) {}
        };
        output.write_all(ctx.internal.protect_safe_attrs(&container.into_string()).as_bytes())?;
        Ok(())
    }
}
