use std::path::Path;

use tracing::instrument;

use crate::error::Result;
use crate::git_processor::GitProcessor;
use crate::ignore_matcher::IgnoreMatcher;
use crate::progress::Progress;
use crate::selection::Selection;
use crate::structure::{build_structure, RepoStructure};

/// A resolved checkout together with its scanned structure. Holds the
/// [`GitProcessor`] so a cloned scratch directory outlives every read from it.
pub struct LoadedRepository {
    processor: GitProcessor,
    structure: RepoStructure,
}

impl LoadedRepository {
    pub fn structure(&self) -> &RepoStructure {
        &self.structure
    }

    pub fn repo_dir(&self) -> &Path {
        self.processor.repo_dir()
    }

    /// The selection right after a load: every file.
    pub fn initial_selection(&self) -> Selection {
        Selection::all(&self.structure)
    }

    pub fn close(self) {
        self.processor.close();
    }
}

/// Resolves `source`, loads its root `.gitignore` and scans the tree. Any
/// failure aborts the whole operation; no partial structure is returned.
#[instrument(skip(progress))]
pub fn process_repository(
    source: &str,
    branch: Option<&str>,
    progress: &Progress,
) -> Result<LoadedRepository> {
    let processor = GitProcessor::resolve(source, branch, progress)?;

    progress.scanning();
    let matcher = IgnoreMatcher::new(processor.repo_dir())?;
    let structure = build_structure(processor.repo_dir(), &matcher)?;

    Ok(LoadedRepository {
        processor,
        structure,
    })
}
