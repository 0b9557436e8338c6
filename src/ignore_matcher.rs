//! Root `.gitignore` matching.
//!
//! Only the `.gitignore` at the repository root is consulted. Nested ignore files,
//! `.git/info/exclude` and the global excludes file are not read.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, warn};

use crate::error::Result;

/// Decides whether a path is excluded from the repository structure.
pub trait IgnorePredicate {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool;
}

impl<F> IgnorePredicate for F
where
    F: Fn(&Path, bool) -> bool,
{
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self(path, is_dir)
    }
}

#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: PathBuf,
    gitignore: Option<Gitignore>,
}

impl IgnoreMatcher {
    /// Builds a matcher from `root/.gitignore`, or one that ignores nothing when
    /// the file does not exist.
    pub fn new(root: &Path) -> Result<Self> {
        let gitignore_path = root.join(".gitignore");
        if !gitignore_path.is_file() {
            debug!(root = %root.display(), "no .gitignore, nothing is excluded");
            return Ok(Self::none(root));
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&gitignore_path) {
            // Bad lines are skipped; the remaining globs still apply.
            warn!(error = %err, "ignoring invalid .gitignore lines");
        }
        let gitignore = builder.build()?;
        debug!(
            patterns = gitignore.num_ignores() + gitignore.num_whitelists(),
            "loaded .gitignore"
        );

        Ok(Self {
            root: root.to_path_buf(),
            gitignore: Some(gitignore),
        })
    }

    pub fn none(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            gitignore: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Accepts paths under the root (as passed to [`IgnoreMatcher::new`]) or
    /// root-relative paths. Absolute paths outside the root are never ignored.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Some(gitignore) = &self.gitignore else {
            return false;
        };

        let relative = match path.strip_prefix(&self.root) {
            Ok(rel) => rel,
            Err(_) if path.is_absolute() => return false,
            Err(_) => path,
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        gitignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

impl IgnorePredicate for IgnoreMatcher {
    fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        IgnoreMatcher::is_ignored(self, path, is_dir)
    }
}
