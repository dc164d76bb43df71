//! Shared test utilities for integration tests.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn git(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()
        .context("Failed to run git")?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Creates a temporary git repository with a committer configured.
///
/// # Errors
///
/// Returns error if git is unavailable or a command fails
pub fn create_test_repo() -> Result<TempDir> {
    let dir = TempDir::new()?;
    git(dir.path(), &["init", "--quiet"])?;
    git(dir.path(), &["config", "user.name", "Test User"])?;
    git(dir.path(), &["config", "user.email", "test@example.com"])?;
    Ok(dir)
}

/// Writes `path` with `content`, commits it, and returns the commit id.
///
/// # Errors
///
/// Returns error if the write or any git command fails
pub fn commit_file(repo_path: &Path, path: &str, content: &str, message: &str) -> Result<String> {
    let file_path = repo_path.join(path);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&file_path, content)?;

    git(repo_path, &["add", path])?;
    git(repo_path, &["commit", "--quiet", "-m", message])?;
    git(repo_path, &["rev-parse", "HEAD"])
}
