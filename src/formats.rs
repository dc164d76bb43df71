//! Renderers for markup formats besides Markdown.

mod asciicast;
mod console;
mod csv;
mod external;

pub use asciicast::AsciicastRenderer;
pub use console::ConsoleRenderer;
pub use csv::CsvRenderer;
pub use external::{DEFAULT_CONTENT_SANDBOX, ExternalRenderer};

/// Link to `relative_path` under the helper's base for `link_type`.
///
/// Rooted so the path joins directly under the base instead of the
/// current directory.
pub(crate) fn file_link(ctx: &crate::context::RenderContext<'_>, link_type: crate::links::LinkType) -> String {
    let path = ctx.options.relative_path.trim_start_matches('/');
    ctx.resolve_link(&format!("/{}", path), link_type)
}
