use super::{Step, closes_token, find_bounded};
use crate::context::RenderContext;
use crate::dom::Document;
use crate::render::CodePreviewOptions;

fn any_char(_: Option<char>) -> bool {
    true
}

/// Replaces permalinks to line ranges of this application with a rendered
/// preview of the referenced code.
///
/// Failures leave the link as is.
pub(crate) fn process(ctx: &mut RenderContext<'_>, doc: &mut Document, text: &str, start: usize) -> Step {
    let markup = ctx.markup();
    let Some(render_preview) = markup.processor_helper().render_repo_file_code_preview.as_ref() else {
        return Step::Done;
    };
    let Some(caps) = find_bounded(&markup.patterns().code_preview, text, start, any_char, closes_token) else {
        return Step::Done;
    };
    let Some(whole) = caps.get(0) else {
        return Step::Done;
    };

    let line_start: usize = caps[5].parse().unwrap_or(1);
    let opts = CodePreviewOptions {
        full_url: whole.as_str().to_string(),
        owner_name: caps[1].to_string(),
        repo_name: caps[2].to_string(),
        commit_id: caps[3].to_string(),
        file_path: caps[4].to_string(),
        line_start,
        line_stop: caps
            .get(6)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(line_start),
    };

    match render_preview(ctx, &opts) {
        Ok(html) => Step::Replace {
            start: whole.start(),
            end: whole.end(),
            node: doc.create_raw(ctx.internal.protect_safe_attrs(&html)),
        },
        Err(e) => {
            tracing::warn!(link = %opts.full_url, error = %e, "Failed to render code preview");
            Step::Skip(whole.end())
        }
    }
}
