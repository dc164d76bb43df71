//! Helpers for content stored in a repository: files, wiki pages and
//! comments.

use std::path::Path;

use crate::context::CancelToken;
use crate::error::Result;
use crate::git::RepoHandle;
use crate::links::{LinkResolver, LinkType, parse_rendered_link, url_join};

use super::RenderHelper;

/// Location of the file being rendered.
#[derive(Debug, Clone)]
pub struct RepoFileOptions {
    /// Repository link, e.g. `/owner/name`
    pub repo_link: String,
    /// Ref sub path, e.g. `branch/main` or `commit/<sha>`
    pub current_ref_path: String,
    /// Directory containing the file, relative to the repository root
    pub current_tree_path: String,
}

/// Helper for files rendered from a repository tree.
///
/// Owns the repository handle for the duration of the render.
#[derive(Debug)]
pub struct RepoFileHelper {
    repo: RepoHandle,
    opts: RepoFileOptions,
}

impl RepoFileHelper {
    /// Creates a helper over an already opened repository.
    pub fn new(repo: RepoHandle, opts: RepoFileOptions) -> Self {
        Self { repo, opts }
    }

    /// Opens the repository at `path` and creates a helper over it.
    ///
    /// # Errors
    ///
    /// Returns error if the repository cannot be opened. There is no
    /// fallback helper without a repository.
    pub fn open(path: impl AsRef<Path>, opts: RepoFileOptions) -> Result<Self> {
        Ok(Self::new(RepoHandle::open(path)?, opts))
    }

    pub fn options(&self) -> &RepoFileOptions {
        &self.opts
    }
}

impl RenderHelper for RepoFileHelper {
    fn clean_up(&mut self) {
        self.repo.close();
    }

    fn is_commit_id_existing(&mut self, cancel: &CancelToken, id: &str) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.repo.commit_exists(id)
    }

    fn resolve_link(&self, resolver: &LinkResolver, link: &str, preferred: LinkType) -> String {
        let (link_type, link) = parse_rendered_link(link, preferred);
        let area = match link_type {
            LinkType::Root => return resolver.resolve_root(link),
            LinkType::Media => "media",
            LinkType::Raw => "raw",
            LinkType::Default => "src",
        };
        let base = url_join(&self.opts.repo_link, &[area, &self.opts.current_ref_path]);
        resolver.resolve_relative(&base, &self.opts.current_tree_path, link)
    }
}

/// Helper for wiki pages.
#[derive(Debug)]
pub struct RepoWikiHelper {
    repo_link: String,
    repo: Option<RepoHandle>,
}

impl RepoWikiHelper {
    /// Creates a wiki helper; `repo` enables commit lookups in the main
    /// repository.
    pub fn new(repo_link: impl Into<String>, repo: Option<RepoHandle>) -> Self {
        Self {
            repo_link: repo_link.into(),
            repo,
        }
    }
}

impl RenderHelper for RepoWikiHelper {
    fn clean_up(&mut self) {
        if let Some(repo) = &mut self.repo {
            repo.close();
        }
    }

    fn is_commit_id_existing(&mut self, cancel: &CancelToken, id: &str) -> bool {
        match &mut self.repo {
            Some(repo) if !cancel.is_cancelled() => repo.commit_exists(id),
            _ => false,
        }
    }

    fn resolve_link(&self, resolver: &LinkResolver, link: &str, preferred: LinkType) -> String {
        let (link_type, link) = parse_rendered_link(link, preferred);
        let base = match link_type {
            LinkType::Root => return resolver.resolve_root(link),
            LinkType::Media | LinkType::Raw => url_join(&self.repo_link, &["wiki", "raw"]),
            LinkType::Default => url_join(&self.repo_link, &["wiki"]),
        };
        resolver.resolve_relative(&base, "", link)
    }
}

/// Helper for comments, issues and other free text attached to a
/// repository.
#[derive(Debug)]
pub struct RepoCommentHelper {
    repo_link: String,
    current_ref_path: Option<String>,
    repo: Option<RepoHandle>,
}

impl RepoCommentHelper {
    pub fn new(repo_link: impl Into<String>, repo: Option<RepoHandle>) -> Self {
        Self {
            repo_link: repo_link.into(),
            current_ref_path: None,
            repo,
        }
    }

    /// Resolves relative links against a ref instead of the repository
    /// home, e.g. for comments on a pull request branch.
    pub fn with_ref_path(mut self, ref_path: impl Into<String>) -> Self {
        self.current_ref_path = Some(ref_path.into());
        self
    }
}

impl RenderHelper for RepoCommentHelper {
    fn clean_up(&mut self) {
        if let Some(repo) = &mut self.repo {
            repo.close();
        }
    }

    fn is_commit_id_existing(&mut self, cancel: &CancelToken, id: &str) -> bool {
        match &mut self.repo {
            Some(repo) if !cancel.is_cancelled() => repo.commit_exists(id),
            _ => false,
        }
    }

    fn resolve_link(&self, resolver: &LinkResolver, link: &str, preferred: LinkType) -> String {
        let (link_type, link) = parse_rendered_link(link, preferred);
        let area = match link_type {
            LinkType::Root => return resolver.resolve_root(link),
            LinkType::Media => "media",
            LinkType::Raw => "raw",
            LinkType::Default => "src",
        };
        let base = match &self.current_ref_path {
            Some(ref_path) => url_join(&self.repo_link, &[area, ref_path]),
            None if link_type == LinkType::Default => self.repo_link.clone(),
            None => url_join(&self.repo_link, &[area]),
        };
        resolver.resolve_relative(&base, "", link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupSettings;

    fn resolver() -> LinkResolver {
        LinkResolver::new(&MarkupSettings::default(), None, false)
    }

    fn file_opts() -> RepoFileOptions {
        RepoFileOptions {
            repo_link: "/owner/repo".to_string(),
            current_ref_path: "branch/main".to_string(),
            current_tree_path: "docs".to_string(),
        }
    }

    #[test]
    fn test_wiki_links() {
        // Arrange
        let helper = RepoWikiHelper::new("/owner/repo", None);

        // Act & Assert
        assert_eq!(
            helper.resolve_link(&resolver(), "Home", LinkType::Default),
            "/owner/repo/wiki/Home"
        );
        assert_eq!(
            helper.resolve_link(&resolver(), "images/logo.png", LinkType::Media),
            "/owner/repo/wiki/raw/images/logo.png"
        );
        assert_eq!(
            helper.resolve_link(&resolver(), "/:root/user2", LinkType::Default),
            "/user2"
        );
    }

    #[test]
    fn test_comment_links() {
        // Arrange
        let helper = RepoCommentHelper::new("/owner/repo", None);

        // Act & Assert
        assert_eq!(
            helper.resolve_link(&resolver(), "issues/1", LinkType::Default),
            "/owner/repo/issues/1"
        );
        assert_eq!(
            helper.resolve_link(&resolver(), "a.png", LinkType::Media),
            "/owner/repo/media/a.png"
        );
    }

    #[test]
    fn test_comment_links_with_ref() {
        // Arrange
        let helper = RepoCommentHelper::new("/owner/repo", None).with_ref_path("branch/dev");

        // Act
        let link = helper.resolve_link(&resolver(), "README.md", LinkType::Default);

        // Assert
        assert_eq!(link, "/owner/repo/src/branch/dev/README.md");
    }

    #[test]
    fn test_helpers_without_repository_report_no_commits() {
        // Arrange
        let mut helper = RepoCommentHelper::new("/owner/repo", None);

        // Act & Assert
        assert!(!helper.is_commit_id_existing(&CancelToken::new(), "abcdef1"));
    }

    #[test]
    fn test_repo_file_requires_repository() {
        // Arrange
        let dir = tempfile::TempDir::new().expect("Should create temp dir");

        // Act
        let result = RepoFileHelper::open(dir.path(), file_opts());

        // Assert
        assert!(result.is_err(), "Opening a non-repository must fail");
    }
}
