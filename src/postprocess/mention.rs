use regex::Regex;
use std::sync::LazyLock;

use super::{Step, closes_token, create_link, find_bounded, opens_token};
use crate::context::RenderContext;
use crate::dom::{Document, NodeId};

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([0-9A-Za-z_-]+(?:\.[0-9A-Za-z_-]+)*)(?:/([0-9A-Za-z_-]+(?:\.[0-9A-Za-z_-]+)*))?")
        .expect("mention pattern is valid")
});

fn after_mention(rest: &str) -> bool {
    rest.starts_with('\'') || closes_token(rest)
}

/// Links `@user` and `@org/team` mentions.
///
/// Does nothing without a mention checker configured on the engine.
pub(crate) fn process(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let markup = ctx.markup();
    let Some(is_mentionable) = markup.processor_helper().is_username_mentionable.as_ref() else {
        return Step::Done;
    };
    let Some(caps) = find_bounded(&MENTION, text, start, opens_token, after_mention) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };
    let name = &caps[1];

    if let Some(team) = caps.get(2) {
        // teams only resolve inside their own organization
        let same_org = ctx.options.meta("org").is_some_and(|org| org == name);
        let team = team.as_str().to_lowercase();
        let known = ctx
            .options
            .meta("teams")
            .is_some_and(|teams| teams.split(',').any(|t| t.trim() == team));
        if !same_org || !known {
            return Step::Skip(whole.end());
        }
        let href = ctx.link_resolver().resolve_root(&format!("org/{}/teams/{}", name, team));
        return Step::Replace {
            start: whole.start(),
            end: whole.end(),
            node: mention_link(ctx, doc, &href, whole.as_str()),
        };
    }

    if !is_mentionable(ctx, name) {
        return Step::Skip(whole.end());
    }
    let href = ctx.link_resolver().resolve_root(name);
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node: mention_link(ctx, doc, &href, whole.as_str()),
    }
}

fn mention_link(ctx: &RenderContext<'_>, doc: &mut Document, href: &str, text: &str) -> NodeId {
    let link = create_link(ctx, doc, href, text, None);
    doc.set_attr(link, "rel", "nofollow");
    link
}
