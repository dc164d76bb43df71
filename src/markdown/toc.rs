//! Table of contents.

use crate::dom::{escape_html, escape_into};

/// A document heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    /// Element id, including the user content prefix
    pub id: String,
}

/// Builds a collapsible nested list of `entries`.
///
/// The smallest level present is the outermost list; deeper levels nest a
/// list directly inside their parent list.
pub fn render_toc(entries: &[TocEntry]) -> String {
    let Some(min_level) = entries.iter().map(|e| e.level).min() else {
        return String::new();
    };

    let mut out = String::from("<details><summary>Table of Contents</summary><ul>");
    let mut level = min_level;
    for entry in entries {
        while level > entry.level {
            out.push_str("</ul>");
            level -= 1;
        }
        while level < entry.level {
            out.push_str("<ul>");
            level += 1;
        }
        out.push_str("<li><a href=\"#");
        escape_into(&mut out, &entry.id, true);
        out.push_str("\">");
        out.push_str(&escape_html(&entry.text));
        out.push_str("</a></li>");
    }
    while level > min_level {
        out.push_str("</ul>");
        level -= 1;
    }
    out.push_str("</ul></details>");
    out
}
