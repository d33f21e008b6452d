//! Changed-file resolution between the target commit and the base branch.
//!
//! Deleted files are excluded: no finding can point at a file that no
//! longer exists at the target commit. Renames are diffed as delete+add,
//! so the new path is kept.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::ChangeSetError;
use crate::paths::normalize_rel_path;

// ── Change set ───────────────────────────────────────────────────

/// Immutable set of repository-relative paths changed by the commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: HashSet<String>,
}

impl ChangeSet {
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in sorted order, for stable logging.
    pub fn sorted(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

impl<S: Into<String>> FromIterator<S> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter
                .into_iter()
                .map(|p| normalize_rel_path(&p.into()))
                .collect(),
        }
    }
}

// ── Detector seam ────────────────────────────────────────────────

/// Version-control capability: which files differ between two revisions.
pub trait ChangedFilesDetector: Send + Sync {
    fn detect(&self, target_commit: &str, base_branch: &str) -> Result<ChangeSet, ChangeSetError>;
}

/// Opens a detector over a locally materialized metadata directory.
pub trait VersionControl: Send + Sync {
    fn open(&self, git_dir: &Path) -> Result<Box<dyn ChangedFilesDetector>, ChangeSetError>;
}

/// [`VersionControl`] backed by the `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl VersionControl for Git {
    fn open(&self, git_dir: &Path) -> Result<Box<dyn ChangedFilesDetector>, ChangeSetError> {
        Ok(Box::new(GitCli::open(git_dir)?))
    }
}

// ── Git CLI implementation ───────────────────────────────────────

/// Create a `Command` for git with process-environment isolation.
///
/// Strips `GIT_DIR` and `GIT_WORK_TREE` so inherited variables cannot
/// override the explicit `--git-dir` used here.
fn git_cmd() -> Command {
    let mut cmd = Command::new("git");
    cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    cmd
}

pub fn git_available() -> bool {
    git_cmd()
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Change-set detector backed by the `git` binary against a `.git` directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    git_dir: PathBuf,
}

impl GitCli {
    /// Open the repository whose metadata lives in `git_dir`.
    pub fn open(git_dir: impl AsRef<Path>) -> Result<Self, ChangeSetError> {
        let git_dir = git_dir.as_ref().to_path_buf();
        let repo_error = |reason: String| ChangeSetError::Repository {
            path: git_dir.display().to_string(),
            reason,
        };

        if !git_dir.is_dir() {
            return Err(repo_error("not a directory".into()));
        }

        let output = git_cmd()
            .arg("--git-dir")
            .arg(&git_dir)
            .args(["rev-parse", "--git-dir"])
            .output()
            .map_err(|e| repo_error(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            return Err(repo_error(stderr_line(&output.stderr)));
        }

        Ok(Self { git_dir })
    }

    fn git(&self) -> Command {
        let mut cmd = git_cmd();
        cmd.arg("--git-dir").arg(&self.git_dir);
        cmd
    }

    /// Resolve `reference` to a full commit id.
    pub fn resolve(&self, reference: &str) -> Result<String, ChangeSetError> {
        let output = self
            .git()
            .args(["rev-parse", "--verify", "--quiet"])
            .arg(format!("{reference}^{{commit}}"))
            .output()
            .map_err(|e| ChangeSetError::Revision {
                reference: reference.to_string(),
                reason: format!("failed to run git: {e}"),
            })?;
        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || id.is_empty() {
            return Err(ChangeSetError::Revision {
                reference: reference.to_string(),
                reason: "unknown revision".into(),
            });
        }
        Ok(id)
    }

    /// Resolve a branch name, falling back to its remote-tracking ref.
    ///
    /// CI checkouts usually only carry `origin/<branch>`.
    pub fn resolve_branch(&self, branch: &str) -> Result<String, ChangeSetError> {
        let candidates = [
            branch.to_string(),
            format!("origin/{branch}"),
            format!("refs/remotes/origin/{branch}"),
        ];
        for candidate in &candidates {
            if let Ok(id) = self.resolve(candidate) {
                return Ok(id);
            }
        }
        Err(ChangeSetError::Revision {
            reference: branch.to_string(),
            reason: format!("none of {} resolved", candidates.join(", ")),
        })
    }
}

impl ChangedFilesDetector for GitCli {
    fn detect(&self, target_commit: &str, base_branch: &str) -> Result<ChangeSet, ChangeSetError> {
        let target = self.resolve(target_commit)?;
        let base = self.resolve_branch(base_branch)?;

        // Three-dot: changes on the target side since the merge base.
        // `-z` keeps paths verbatim; without it git C-quotes unusual names.
        let output = self
            .git()
            .args(["diff", "-z", "--name-status", "--no-renames"])
            .arg(format!("{base}...{target}"))
            .output()
            .map_err(|e| ChangeSetError::Repository {
                path: self.git_dir.display().to_string(),
                reason: format!("failed to run git diff: {e}"),
            })?;
        if !output.status.success() {
            return Err(ChangeSetError::Revision {
                reference: format!("{base_branch}...{target_commit}"),
                reason: stderr_line(&output.stderr),
            });
        }

        let changes = parse_name_status(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(
            base = %base,
            target = %target,
            changed = changes.len(),
            "Resolved change set"
        );
        Ok(changes)
    }
}

/// Parse `git diff -z --name-status` output, dropping deleted paths.
///
/// Records are `STATUS\0PATH\0`; `--no-renames` guarantees one path each.
fn parse_name_status(stdout: &str) -> ChangeSet {
    let mut fields = stdout.split('\0');
    let mut paths = Vec::new();
    while let (Some(status), Some(path)) = (fields.next(), fields.next()) {
        if status.starts_with('D') || path.is_empty() {
            continue;
        }
        paths.push(path);
    }
    paths.into_iter().collect()
}

fn stderr_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("git exited with an error")
        .trim()
        .to_string()
}
