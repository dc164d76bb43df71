//! Git repository access for render helpers.

use std::path::{Path, PathBuf};

use crate::error::{RenderError, Result};

/// Longest hex object id accepted (SHA-256 object format).
const MAX_OBJECT_ID_LEN: usize = 64;

/// Shortest abbreviated object id accepted for lookups.
const MIN_OBJECT_ID_LEN: usize = 4;

/// Repository handle owned by a single render.
///
/// The repository is opened on demand the first time a lookup needs it and
/// released by [`RepoHandle::close`].
#[derive(Debug)]
pub struct RepoHandle {
    path: PathBuf,
    repo: Option<gix::Repository>,
}

impl RepoHandle {
    /// Opens the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the path is not a git repository.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = open_repository(&path)?;
        Ok(Self {
            path,
            repo: Some(repo),
        })
    }

    /// Repository path this handle was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the underlying repository is currently open.
    pub fn is_open(&self) -> bool {
        self.repo.is_some()
    }

    /// Checks whether `id` names a commit, accepting abbreviated hex ids.
    ///
    /// Ambiguous abbreviations, non-hex input and ids of other object kinds
    /// all report `false`. A closed handle reopens the repository.
    pub fn commit_exists(&mut self, id: &str) -> bool {
        if !is_hex_object_id(id) {
            return false;
        }

        if self.repo.is_none() {
            match open_repository(&self.path) {
                Ok(repo) => self.repo = Some(repo),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to reopen repository");
                    return false;
                }
            }
        }

        let Some(repo) = &self.repo else {
            return false;
        };

        match repo.rev_parse_single(id) {
            Ok(object_id) => object_id
                .object()
                .map(|object| object.kind == gix::object::Kind::Commit)
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!(id, error = %e, "Commit lookup failed");
                false
            }
        }
    }

    /// Releases the repository; later lookups reopen it.
    pub fn close(&mut self) {
        self.repo = None;
    }
}

fn open_repository(path: &Path) -> Result<gix::Repository> {
    gix::open(path).map_err(|e| {
        RenderError::Repository(format!(
            "Failed to open repository at {}: {}",
            path.display(),
            e
        ))
    })
}

/// Whether `id` looks like a full or abbreviated hex object id.
pub fn is_hex_object_id(id: &str) -> bool {
    (MIN_OBJECT_ID_LEN..=MAX_OBJECT_ID_LEN).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_hexdigit())
}
