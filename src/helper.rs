//! Render helpers: link resolution and commit lookups for one render.
//!
//! A helper decouples the rendering engine from data access. Each variant
//! maps the logical [`LinkType`]s onto the base paths of the page being
//! rendered and optionally answers whether a commit id exists.

mod repo;
mod simple;

pub use repo::{RepoCommentHelper, RepoFileHelper, RepoFileOptions, RepoWikiHelper};
pub use simple::SimpleDocumentHelper;

use crate::context::CancelToken;
use crate::links::{LinkResolver, LinkType};

/// Link resolution and commit lookup for one render.
pub trait RenderHelper {
    /// Releases resources opened by the helper.
    ///
    /// Runs exactly once when the owning render context is dropped.
    fn clean_up(&mut self) {}

    /// Whether `id` (full or abbreviated hex) names an existing commit.
    ///
    /// Helpers that may block must check `cancel` before doing so.
    fn is_commit_id_existing(&mut self, cancel: &CancelToken, id: &str) -> bool {
        let _ = (cancel, id);
        false
    }

    /// Resolves `link`, which may carry a `/:<type>` token, to a path or URL.
    fn resolve_link(&self, resolver: &LinkResolver, link: &str, preferred: LinkType) -> String;
}
