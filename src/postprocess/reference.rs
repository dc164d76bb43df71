//! Issue, pull request and commit references.

use regex::Regex;
use std::sync::LazyLock;

use super::{Step, closes_token, create_code_link, create_link, find_bounded, opens_token};
use crate::context::RenderContext;
use crate::dom::Document;
use crate::render::IssueIconTitleOptions;

static ISSUE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:([0-9A-Za-z_.-]+)/([0-9A-Za-z_.-]+))?#(\d+)").expect("issue pattern is valid")
});

static COMMIT_SHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9a-f]{7,64}").expect("sha pattern is valid"));

const SHORT_SHA_LEN: usize = 10;

fn before_issue(prev: Option<char>) -> bool {
    opens_token(prev) || matches!(prev, Some('\'' | '"'))
}

fn after_issue(rest: &str) -> bool {
    rest.starts_with(['\'', '"']) || closes_token(rest)
}

fn after_sha(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_whitespace() || matches!(c, ')' | ']') => true,
        Some('.' | ',' | ':') => chars.next().is_none_or(char::is_whitespace),
        _ => false,
    }
}

fn any_char(_: Option<char>) -> bool {
    true
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

/// Links `#123` and `owner/repo#123`.
///
/// Local references need the `user` and `repo` metas.
pub(crate) fn issue_ref(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let Some(caps) = find_bounded(&ISSUE_REF, text, start, before_issue, after_issue) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };

    let (owner, repo) = match (caps.get(1), caps.get(2)) {
        (Some(owner), Some(repo)) => (owner.as_str(), repo.as_str()),
        _ => match (ctx.options.meta("user"), ctx.options.meta("repo")) {
            (Some(user), Some(repo)) => (user, repo),
            _ => return Step::Skip(whole.end()),
        },
    };

    let href = ctx
        .link_resolver()
        .resolve_root(&format!("{}/{}/issues/{}", owner, repo, &caps[3]));
    let node = create_link(ctx, doc, &href, whole.as_str(), Some("ref-issue"));
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node,
    }
}

/// Links bare commit hashes that exist in the current repository.
pub(crate) fn commit_sha(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let (Some(user), Some(repo)) = (ctx.options.meta("user"), ctx.options.meta("repo")) else {
        return Step::Done;
    };
    let (user, repo) = (user.to_string(), repo.to_string());

    let Some(caps) = find_bounded(&COMMIT_SHA, text, start, opens_token, after_sha) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };
    let sha = whole.as_str();
    if !ctx.is_commit_id_existing(sha) {
        return Step::Skip(whole.end());
    }

    let href = ctx
        .link_resolver()
        .resolve_root(&format!("{}/{}/commit/{}", user, repo, sha));
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node: create_code_link(doc, &href, short_sha(sha)),
    }
}

/// Shortens full issue and pull request URLs of this application.
pub(crate) fn full_issue_url(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let markup = ctx.markup();
    let Some(caps) = find_bounded(&markup.patterns().full_issue, text, start, any_char, closes_token) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };
    let (owner, repo, index) = (&caps[1], &caps[2], &caps[3]);

    if let Some(render_icon_title) = markup.processor_helper().render_repo_issue_icon_title.as_ref() {
        let opts = IssueIconTitleOptions {
            owner_name: owner.to_string(),
            repo_name: repo.to_string(),
            link_href: whole.as_str().to_string(),
            issue_index: index.parse().unwrap_or_default(),
        };
        match render_icon_title(ctx, &opts) {
            Ok(html) => {
                let node = doc.create_raw(ctx.internal.protect_safe_attrs(&html));
                return Step::Replace {
                    start: whole.start(),
                    end: whole.end(),
                    node,
                };
            }
            Err(e) => tracing::warn!(link = whole.as_str(), error = %e, "Failed to render issue title"),
        }
    }

    let same_repo = ctx.options.meta("user") == Some(owner) && ctx.options.meta("repo") == Some(repo);
    let mut label = if same_repo {
        format!("#{}", index)
    } else {
        format!("{}/{}#{}", owner, repo, index)
    };
    if caps
        .get(4)
        .is_some_and(|anchor| anchor.as_str().starts_with("#issuecomment-"))
    {
        label.push_str(" (comment)");
    }

    let node = create_link(ctx, doc, whole.as_str(), &label, Some("ref-issue"));
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node,
    }
}

/// Shortens full commit URLs of this application.
pub(crate) fn full_commit_url(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let markup = ctx.markup();
    let Some(caps) = find_bounded(&markup.patterns().full_commit, text, start, any_char, closes_token) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };

    let mut label = short_sha(&caps[3]).to_string();
    if let Some(path) = caps.get(4) {
        label.push_str(path.as_str());
    }

    let node = create_code_link(doc, whole.as_str(), &label);
    doc.set_attr(node, &ctx.internal.safe_attr("class"), ctx.internal.safe_value("commit"));
    Step::Replace {
        start: whole.start(),
        end: whole.end(),
        node,
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MarkupSettings;
    use crate::context::{CancelToken, RenderContext};
    use crate::helper::RenderHelper;
    use crate::links::{LinkResolver, LinkType};
    use crate::postprocess::{ProcessorSet, post_process};
    use crate::render::{IssueIconTitleOptions, Markup, ProcessorHelper};

    /// Knows exactly one commit.
    struct OneCommit;

    impl RenderHelper for OneCommit {
        fn is_commit_id_existing(&mut self, _: &CancelToken, id: &str) -> bool {
            "0123456789abcdef0123456789abcdef01234567".starts_with(id)
        }

        fn resolve_link(&self, resolver: &LinkResolver, link: &str, _: LinkType) -> String {
            resolver.resolve_root(link)
        }
    }

    fn settings() -> MarkupSettings {
        MarkupSettings {
            app_url: "https://git.example.com/".to_string(),
            ..MarkupSettings::default()
        }
    }

    fn render(markup: &Markup, html: &str, set: &ProcessorSet) -> String {
        let mut ctx = RenderContext::new(markup, OneCommit);
        ctx.options.metas.insert("user".to_string(), "acme".to_string());
        ctx.options.metas.insert("repo".to_string(), "rocket".to_string());
        post_process(&mut ctx, html, set).expect("Should process")
    }

    #[test]
    fn test_local_issue_reference() {
        // Arrange
        let markup = Markup::new(settings()).expect("Should build markup");

        // Act
        let html = render(&markup, "<p>fixes #12.</p>", &ProcessorSet::DEFAULT);

        // Assert
        assert_eq!(html, r#"<p>fixes <a href="/acme/rocket/issues/12" class="ref-issue">#12</a>.</p>"#);
    }

    #[test]
    fn test_cross_repo_reference() {
        let markup = Markup::new(settings()).expect("Should build markup");
        let html = render(&markup, "<p>see other/lib#3</p>", &ProcessorSet::DEFAULT);
        assert_eq!(html, r#"<p>see <a href="/other/lib/issues/3" class="ref-issue">other/lib#3</a></p>"#);
    }

    #[test]
    fn test_hash_inside_word_is_ignored() {
        let markup = Markup::new(settings()).expect("Should build markup");
        assert_eq!(
            render(&markup, "<p>C#7 and a#1</p>", &ProcessorSet::DEFAULT),
            "<p>C#7 and a#1</p>"
        );
    }

    #[test]
    fn test_existing_commit_sha_linked() {
        // Arrange
        let markup = Markup::new(settings()).expect("Should build markup");

        // Act
        let known = render(&markup, "<p>in 0123456789abc, done</p>", &ProcessorSet::DEFAULT);
        let unknown = render(&markup, "<p>in deadbeefcafe</p>", &ProcessorSet::DEFAULT);

        // Assert
        assert_eq!(
            known,
            r#"<p>in <a href="/acme/rocket/commit/0123456789abc"><code>0123456789</code></a>, done</p>"#
        );
        assert_eq!(unknown, "<p>in deadbeefcafe</p>");
    }

    #[test]
    fn test_full_issue_url_shortened() {
        // Arrange
        let markup = Markup::new(settings()).expect("Should build markup");

        // Act
        let same = render(
            &markup,
            "<p>https://git.example.com/acme/rocket/issues/4</p>",
            &ProcessorSet::DEFAULT,
        );
        let other = render(
            &markup,
            "<p>https://git.example.com/other/lib/pulls/9#issuecomment-1</p>",
            &ProcessorSet::DEFAULT,
        );

        // Assert
        assert_eq!(
            same,
            r#"<p><a href="https://git.example.com/acme/rocket/issues/4" class="ref-issue">#4</a></p>"#
        );
        assert_eq!(
            other,
            r#"<p><a href="https://git.example.com/other/lib/pulls/9#issuecomment-1" class="ref-issue">other/lib#9 (comment)</a></p>"#
        );
    }

    #[test]
    fn test_bare_autolink_is_unwrapped() {
        // Arrange
        let markup = Markup::new(settings()).expect("Should build markup");
        let url = "https://git.example.com/acme/rocket/commit/0123456789abcdef";

        // Act
        let html = render(
            &markup,
            &format!(r#"<p><a href="{url}">{url}</a></p>"#),
            &ProcessorSet::DEFAULT,
        );

        // Assert
        assert_eq!(
            html,
            format!(r#"<p><a href="{url}" class="commit"><code>0123456789</code></a></p>"#)
        );
    }

    #[test]
    fn test_labelled_link_is_kept() {
        let markup = Markup::new(settings()).expect("Should build markup");
        let html = r#"<p><a href="https://git.example.com/acme/rocket/issues/4">the bug</a></p>"#;
        assert_eq!(render(&markup, html, &ProcessorSet::DEFAULT), html);
    }

    #[test]
    fn test_issue_icon_title_collaborator() {
        // Arrange
        let markup = Markup::builder(settings())
            .processor_helper(ProcessorHelper {
                render_repo_issue_icon_title: Some(Box::new(|_: &RenderContext<'_>, opts: &IssueIconTitleOptions| {
                    Ok(format!(r#"<a href="{}" class="ref-issue">#{} title</a>"#, opts.link_href, opts.issue_index))
                })),
                ..ProcessorHelper::default()
            })
            .build()
            .expect("Should build markup");

        // Act
        let html = render(
            &markup,
            "<p>https://git.example.com/acme/rocket/issues/4</p>",
            &ProcessorSet::DEFAULT,
        );

        // Assert
        assert_eq!(
            html,
            r#"<p><a href="https://git.example.com/acme/rocket/issues/4" class="ref-issue">#4 title</a></p>"#
        );
    }
}
