use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("'{}' is not a git repository (no .git found)", path.display())]
    NotAGitRepository { path: PathBuf },

    #[error("branch '{branch}' not found")]
    BranchNotFound { branch: String },

    #[error("failed to clone '{url}': {source}")]
    CloneFailed {
        url: String,
        #[source]
        source: git2::Error,
    },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("cannot read '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid .gitignore: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("invalid repository url: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no files selected")]
    NothingSelected,

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}
