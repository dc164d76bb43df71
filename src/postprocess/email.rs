use regex::Regex;
use std::sync::LazyLock;

use super::{Step, closes_token, create_link, find_bounded, opens_token};
use crate::context::RenderContext;
use crate::dom::Document;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)*\.[A-Za-z]{2,}").expect("email pattern is valid")
});

/// Links plain email addresses with `mailto:`.
pub(crate) fn process(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let Some(caps) = find_bounded(&EMAIL, text, start, opens_token, closes_token) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };

    let href = format!("mailto:{}", whole.as_str());
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node: create_link(ctx, doc, &href, whole.as_str(), Some("mailto")),
    }
}
