//! Markdown rendering with GitHub Flavored Markdown support.
//!
//! Rendering uses comrak with GFM extensions (tables, strikethrough,
//! autolinks, footnotes) and adds math, task lists, heading ids, a table of
//! contents and YAML front matter on top.

mod frontmatter;
mod heading;
mod math;
mod renderer;
mod tasklist;
mod toc;

pub use frontmatter::{MetaMode, RenderConfig};
pub use heading::{HeadingIds, USER_CONTENT_PREFIX, clean_value};
pub use renderer::MarkdownRenderer;
pub use toc::{TocEntry, render_toc};
