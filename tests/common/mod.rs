#![allow(dead_code)]

use std::fs;
use std::path::Path;

use git2::build::CheckoutBuilder;
use git2::{Commit, IndexAddOption, Repository, RepositoryInitOptions, Signature};

pub fn write_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Initializes a repository whose first branch is `main`.
pub fn init_repo(root: &Path) -> Repository {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    Repository::init_opts(root, &opts).unwrap()
}

pub fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

pub fn force_checkout(repo: &Repository, branch: &str) {
    let refname = format!("refs/heads/{branch}");
    let target = repo.revparse_single(&refname).unwrap();
    repo.checkout_tree(&target, Some(CheckoutBuilder::new().force()))
        .unwrap();
    repo.set_head(&refname).unwrap();
}

/// `main` holds `README.md` and `src/app.py`; `feature` changes `src/app.py`
/// and adds `src/extra.py`. Leaves `main` checked out.
pub fn repo_with_feature_branch(root: &Path) -> Repository {
    let repo = init_repo(root);
    write_file(root, "README.md", "# demo\n");
    write_file(root, "src/app.py", "print('main')\n");
    commit_all(&repo, "initial");

    {
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch("feature", &head, false).unwrap();
    }
    force_checkout(&repo, "feature");
    write_file(root, "src/app.py", "print('feature')\n");
    write_file(root, "src/extra.py", "x = 1\n");
    commit_all(&repo, "feature work");

    force_checkout(&repo, "main");
    repo
}

pub fn head_shorthand(root: &Path) -> String {
    let repo = Repository::open(root).unwrap();
    let head = repo.head().unwrap();
    head.shorthand().unwrap().to_string()
}
