//! Turns a user-supplied path or URL into a local checkout to walk.
//!
//! Local checkouts are used in place (and switched to the requested branch,
//! mutating the working tree). Remote URLs are cloned into a scratch directory
//! owned by the [`GitProcessor`] and removed when it is closed or dropped.

use std::path::{Path, PathBuf};

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{BranchType, ErrorCode, FetchOptions, RemoteCallbacks, Repository};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::structure::GIT_DIR;

/// A remote repository after URL normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    pub url: String,
    pub branch: Option<String>,
    pub name: String,
}

impl RemoteSource {
    /// Normalizes web-UI URLs such as `https://github.com/o/r/tree/dev` into a
    /// clonable `https://github.com/o/r.git` plus branch `dev`. An explicit
    /// `branch` overrides one found in the URL.
    pub fn parse(input: &str, branch: Option<&str>) -> Result<Self> {
        let input = input.trim();

        if is_scp_like(input) {
            return Ok(Self {
                url: input.to_string(),
                branch: branch.map(str::to_string),
                name: repo_name(input.rsplit([':', '/']).next().unwrap_or("")),
            });
        }

        let mut url = Url::parse(input)?;
        let mut segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let mut url_branch = None;
        if matches!(url.scheme(), "http" | "https") {
            if let Some(pos) = segments.iter().position(|s| s == "tree") {
                if pos >= 2 && pos + 1 < segments.len() {
                    url_branch = Some(segments[pos + 1..].join("/"));
                    let end = if segments[pos - 1] == "-" { pos - 1 } else { pos };
                    segments.truncate(end);
                }
            }

            if let Some(last) = segments.last_mut() {
                if !last.ends_with(".git") {
                    last.push_str(".git");
                }
            }
            url.set_path(&format!("/{}", segments.join("/")));
            url.set_query(None);
            url.set_fragment(None);
        }

        let name = repo_name(segments.last().map(String::as_str).unwrap_or(""));

        Ok(Self {
            url: url.to_string(),
            branch: branch.map(str::to_string).or(url_branch),
            name,
        })
    }
}

fn is_scp_like(input: &str) -> bool {
    !input.contains("://") && input.contains('@') && input.contains(':')
}

fn repo_name(segment: &str) -> String {
    let name = segment.trim_end_matches(".git");
    if name.is_empty() {
        "repo".to_string()
    } else {
        name.to_string()
    }
}

pub struct GitProcessor {
    repo_dir: PathBuf,
    scratch: Option<TempDir>,
}

impl GitProcessor {
    /// Resolves `source` to a local checkout.
    ///
    /// An existing directory must contain `.git`; with `branch` it is switched
    /// to that branch in place. Anything else is treated as a remote URL and
    /// cloned into a fresh scratch directory.
    #[instrument(skip(progress))]
    pub fn resolve(source: &str, branch: Option<&str>, progress: &Progress) -> Result<Self> {
        let path = Path::new(source);
        if path.is_dir() {
            return Self::open_local(path, branch, progress);
        }

        let remote = RemoteSource::parse(source, branch)?;
        Self::clone_remote(&remote, progress)
    }

    fn open_local(path: &Path, branch: Option<&str>, progress: &Progress) -> Result<Self> {
        if !path.join(GIT_DIR).exists() {
            return Err(Error::NotAGitRepository {
                path: path.to_path_buf(),
            });
        }

        if let Some(branch) = branch {
            progress.switching(branch);
            switch_branch(path, branch)?;
        }

        info!(path = %path.display(), "using local repository");
        Ok(Self {
            repo_dir: path.to_path_buf(),
            scratch: None,
        })
    }

    fn clone_remote(remote: &RemoteSource, progress: &Progress) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("repoflat-").tempdir()?;
        let clone_path = scratch.path().join(&remote.name);

        progress.cloning(&remote.url);
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|stats| {
            progress.received(stats.received_objects(), stats.total_objects());
            true
        });
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options);
        if let Some(branch) = &remote.branch {
            builder.branch(branch);
        }

        // On error `scratch` drops here and takes the partial clone with it.
        builder
            .clone(&remote.url, &clone_path)
            .map_err(|err| clone_error(remote, err))?;

        info!(url = %remote.url, path = %clone_path.display(), "cloned repository");
        Ok(Self {
            repo_dir: clone_path,
            scratch: Some(scratch),
        })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Whether the checkout lives in a scratch directory owned by this value.
    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    /// Removes the scratch directory now. Failures are logged, never returned;
    /// the directory may already be gone.
    pub fn close(mut self) {
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            match scratch.close() {
                Ok(()) => debug!(path = %path.display(), "removed scratch directory"),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "could not remove scratch directory"
                    )
                }
            }
        }
    }

    pub fn is_git_url(url: &str) -> bool {
        if is_scp_like(url) {
            return true;
        }
        if let Ok(parsed_url) = Url::parse(url) {
            let host = parsed_url.host_str().unwrap_or("");
            let is_git_host = host.contains("github.com")
                || host.contains("gitlab.com")
                || host.contains("bitbucket.org")
                || host.contains("dev.azure.com");

            return matches!(parsed_url.scheme(), "git" | "ssh" | "file")
                || url.ends_with(".git")
                || (is_git_host && !url.contains("/raw/"));
        }
        false
    }
}

fn clone_error(remote: &RemoteSource, err: git2::Error) -> Error {
    if let Some(branch) = &remote.branch {
        if err.code() == ErrorCode::NotFound || err.message().contains("not found") {
            return Error::BranchNotFound {
                branch: branch.clone(),
            };
        }
    }
    Error::CloneFailed {
        url: remote.url.clone(),
        source: err,
    }
}

/// Switches the checkout at `repo_dir` to `branch`, trying the local branch
/// first and then `origin/<branch>`. The branch is resolved before anything is
/// touched, and HEAD only moves after the working tree checkout succeeded.
fn switch_branch(repo_dir: &Path, branch: &str) -> Result<()> {
    let repo = Repository::open(repo_dir)?;

    let local = match repo.find_branch(branch, BranchType::Local) {
        Ok(found) => Some(found),
        Err(err) if is_missing(&err) => None,
        Err(err) => return Err(err.into()),
    };

    let (commit, upstream) = match local {
        Some(found) => (found.get().peel_to_commit()?, None),
        None => {
            let remote_name = format!("origin/{branch}");
            match repo.find_branch(&remote_name, BranchType::Remote) {
                Ok(found) => (found.get().peel_to_commit()?, Some(remote_name)),
                Err(err) if is_missing(&err) => {
                    return Err(Error::BranchNotFound {
                        branch: branch.to_string(),
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    };

    // The tracking branch exists before the worktree changes and is deleted
    // again if any later step fails.
    let mut tracking = match upstream {
        Some(upstream) => Some(create_tracking_branch(&repo, branch, &commit, &upstream)?),
        None => None,
    };

    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    let switched = repo
        .checkout_tree(commit.as_object(), Some(&mut checkout))
        .and_then(|()| repo.set_head(&format!("refs/heads/{branch}")));
    if let Err(err) = switched {
        if let Some(created) = tracking.as_mut() {
            discard_branch(created, branch);
        }
        return Err(err.into());
    }

    info!(branch, "switched branch");
    Ok(())
}

fn create_tracking_branch<'r>(
    repo: &'r Repository,
    branch: &str,
    commit: &git2::Commit<'_>,
    upstream: &str,
) -> Result<git2::Branch<'r>> {
    let mut created = repo.branch(branch, commit, false)?;
    if let Err(err) = created.set_upstream(Some(upstream)) {
        discard_branch(&mut created, branch);
        return Err(err.into());
    }
    debug!(branch, upstream, "created tracking branch");
    Ok(created)
}

fn discard_branch(created: &mut git2::Branch<'_>, branch: &str) {
    if let Err(err) = created.delete() {
        warn!(branch, error = %err, "could not remove tracking branch");
    }
}

fn is_missing(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::NotFound | ErrorCode::InvalidSpec)
}
