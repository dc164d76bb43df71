use regex::Regex;
use std::sync::LazyLock;

use super::{Step, create_link, find_bounded};
use crate::context::RenderContext;
use crate::dom::Document;

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\])]+"#).expect("url pattern is valid"));

fn before_url(prev: Option<char>) -> bool {
    prev.is_none_or(|c| !c.is_alphanumeric())
}

fn any_rest(_: &str) -> bool {
    true
}

/// Links bare `http(s)://` URLs in plain text.
pub(crate) fn process(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let Some(caps) = find_bounded(&URL, text, start, before_url, any_rest) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };

    // sentence punctuation after a URL is not part of it
    let url = whole.as_str().trim_end_matches(['.', ',', ':', ';', '!', '?']);
    if url.ends_with("://") {
        return Step::Skip(whole.end());
    }

    let end = whole.start() + url.len();
    Step::Replace {
        start: whole.start(),
        end,
        node: create_link(ctx, doc, url, url, None),
    }
}
