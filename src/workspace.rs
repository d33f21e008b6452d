//! Access to the build workspace: report files and `.git` metadata.
//!
//! The host may run the build on another machine, so everything the
//! pipeline reads from the workspace goes through [`FileTransfer`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// File retrieval capability offered by the host.
pub trait FileTransfer: Send + Sync {
    /// Read a report file; `path` is absolute or workspace-relative.
    fn read_to_string(&self, path: &str) -> io::Result<String>;

    /// Make `relative` available on the local filesystem for the
    /// lifetime of the returned handle.
    fn materialize(&self, relative: &str) -> io::Result<LocalCopy>;
}

/// A workspace path made available locally.
///
/// Scoped copies are deleted when the handle drops, whichever way the
/// run ends.
#[derive(Debug)]
pub struct LocalCopy {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl LocalCopy {
    pub fn in_place(path: PathBuf) -> Self {
        Self {
            path,
            scratch: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_scoped(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Workspace on the local disk.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
    isolate: bool,
}

impl LocalWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            isolate: false,
        }
    }

    /// Copy materialized paths into a scratch directory instead of
    /// using them in place.
    pub fn isolated(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        }
    }
}

impl FileTransfer for LocalWorkspace {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.resolve(path))
    }

    fn materialize(&self, relative: &str) -> io::Result<LocalCopy> {
        let source = self.resolve(relative);
        if !source.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", source.display()),
            ));
        }
        if !self.isolate {
            return Ok(LocalCopy::in_place(source));
        }

        let scratch = tempfile::Builder::new().prefix("code-insights-").tempdir()?;
        let name = source
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "copy".into());
        let target = scratch.path().join(name);
        copy_recursive(&source, &target)?;
        tracing::debug!(source = %source.display(), target = %target.display(), "Materialized workspace path");

        Ok(LocalCopy {
            path: target,
            scratch: Some(scratch),
        })
    }
}

fn copy_recursive(source: &Path, target: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(source)?;
    if meta.is_dir() {
        fs::create_dir_all(target)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &target.join(entry.file_name()))?;
        }
    } else if meta.is_file() {
        fs::copy(source, target)?;
    }
    // Symlinks inside .git are not needed for diffing; skip them.
    Ok(())
}
