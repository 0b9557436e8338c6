//! The repository structure: a nested, ordered model of the directory tree.
//!
//! Every node carries its full path (root-relative, `/`-separated), which is the
//! identity used by selection tracking and content lookup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, instrument, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Error, Result};
use crate::ignore_matcher::IgnorePredicate;

pub const GIT_DIR: &str = ".git";

pub type Entries = IndexMap<String, Node>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Directory(Directory),
    File(FileLeaf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub name: String,
    pub path: String,
    pub children: Entries,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLeaf {
    pub name: String,
    pub path: String,
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Directory(dir) => &dir.name,
            Node::File(file) => &file.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Node::Directory(dir) => &dir.path,
            Node::File(file) => &file.path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// Full paths of every file at or below this node.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        collect_files(std::slice::from_ref(self), &mut paths);
        paths
    }
}

fn collect_files<'a, I>(nodes: I, out: &mut Vec<&'a str>)
where
    I: IntoIterator<Item = &'a Node>,
{
    for node in nodes {
        match node {
            Node::File(file) => out.push(&file.path),
            Node::Directory(dir) => collect_files(dir.children.values(), out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStructure {
    root: PathBuf,
    entries: Entries,
}

impl RepoStructure {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &Entries {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Full paths of all files, in structure order.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        collect_files(self.entries.values(), &mut paths);
        paths
    }

    /// Looks up a node by its full path.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let mut node = self.entries.get(parts.next()?)?;
        for part in parts {
            match node {
                Node::Directory(dir) => node = dir.children.get(part)?,
                Node::File(_) => return None,
            }
        }
        Some(node)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.get(path).is_some_and(Node::is_dir)
    }

    /// Absolute location of a full path on disk.
    pub fn absolute_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|p| !p.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

/// Walks `root` and builds its structure, leaving out `.git` at any depth and
/// everything `ignore` rejects. Ignored directories are not descended into.
///
/// Symlinks are never followed. A symlink is kept as a file only when it
/// resolves to a regular file inside `root`.
#[instrument(skip(root, ignore), fields(root = %root.display()))]
pub fn build_structure(root: &Path, ignore: &dyn IgnorePredicate) -> Result<RepoStructure> {
    if !root.is_dir() {
        return Err(Error::Unreadable {
            path: root.to_path_buf(),
            source: io::Error::other("not a directory"),
        });
    }

    let canonical_root = fs::canonicalize(root).map_err(|source| Error::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut entries = Entries::new();
    let mut skipped = 0usize;

    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| should_visit(e, ignore));

    while let Some(result) = walker.next() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                let path = err.path().unwrap_or(root).to_path_buf();
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("walk failed at repository root"));
                return Err(Error::Unreadable { path, source });
            }
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let parts = match relative_parts(root, entry.path()) {
            Ok(parts) => parts,
            Err(PathIssue::NonUtf8) => {
                warn!(path = %entry.path().display(), "non-UTF-8 name, skipped");
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                skipped += 1;
                continue;
            }
            Err(PathIssue::OutsideRoot) => {
                warn!(path = %entry.path().display(), "entry outside repository root, skipped");
                skipped += 1;
                continue;
            }
        };

        let file_type = entry.file_type();
        let node_is_dir = if file_type.is_dir() {
            true
        } else if file_type.is_file() {
            false
        } else if file_type.is_symlink() && symlink_stays_inside(entry.path(), &canonical_root) {
            false
        } else {
            debug!(path = %entry.path().display(), "skipping special entry");
            continue;
        };

        let (name, parents) = match parts.split_last() {
            Some(split) => split,
            None => continue,
        };
        let Some(level) = level_mut(&mut entries, parents) else {
            // Parent was skipped earlier.
            continue;
        };

        let path = parts.join("/");
        let node = if node_is_dir {
            Node::Directory(Directory {
                name: name.clone(),
                path,
                children: Entries::new(),
            })
        } else {
            Node::File(FileLeaf {
                name: name.clone(),
                path,
            })
        };
        level.insert(name.clone(), node);
    }

    debug!(top_level = entries.len(), skipped, "structure built");

    Ok(RepoStructure {
        root: root.to_path_buf(),
        entries,
    })
}

fn should_visit(entry: &DirEntry, ignore: &dyn IgnorePredicate) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if entry.file_name() == GIT_DIR {
        return false;
    }
    !ignore.is_ignored(entry.path(), entry.file_type().is_dir())
}

enum PathIssue {
    OutsideRoot,
    NonUtf8,
}

fn relative_parts(root: &Path, path: &Path) -> std::result::Result<Vec<String>, PathIssue> {
    let relative = path.strip_prefix(root).map_err(|_| PathIssue::OutsideRoot)?;
    relative
        .components()
        .map(|c| match c {
            std::path::Component::Normal(name) => {
                name.to_str().map(str::to_string).ok_or(PathIssue::NonUtf8)
            }
            _ => Err(PathIssue::OutsideRoot),
        })
        .collect()
}

fn symlink_stays_inside(path: &Path, canonical_root: &Path) -> bool {
    match fs::canonicalize(path) {
        Ok(target) => target.starts_with(canonical_root) && target.is_file(),
        Err(_) => false,
    }
}

fn level_mut<'a>(entries: &'a mut Entries, parents: &[String]) -> Option<&'a mut Entries> {
    let mut current = entries;
    for name in parents {
        match current.get_mut(name)? {
            Node::Directory(dir) => current = &mut dir.children,
            Node::File(_) => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_matcher::IgnoreMatcher;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn nothing_ignored(_: &Path, _: bool) -> bool {
        false
    }

    #[test]
    fn test_nested_structure() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "README.md", "# hi");
        touch(dir.path(), "src/main.rs", "fn main() {}");
        touch(dir.path(), "src/util/mod.rs", "");

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        let names: Vec<_> = structure.entries().keys().cloned().collect();
        assert_eq!(names, vec!["README.md", "src"]);
        assert!(structure.is_directory("src"));
        assert!(structure.is_directory("src/util"));
        assert!(!structure.is_directory("src/main.rs"));
        assert_eq!(
            structure.get("src/util/mod.rs").map(Node::path),
            Some("src/util/mod.rs")
        );
        assert_eq!(
            structure.file_paths(),
            vec!["README.md", "src/main.rs", "src/util/mod.rs"]
        );
    }

    #[test]
    fn test_git_dir_pruned_at_any_depth() {
        let dir = tempdir().unwrap();
        touch(dir.path(), ".git/HEAD", "ref: refs/heads/main");
        touch(dir.path(), "vendor/lib/.git/config", "");
        touch(dir.path(), "vendor/lib/lib.rs", "");

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        assert!(structure.get(".git").is_none());
        assert!(structure.get("vendor/lib/.git").is_none());
        assert_eq!(structure.file_paths(), vec!["vendor/lib/lib.rs"]);
    }

    #[test]
    fn test_ignored_dirs_and_files_excluded() {
        let dir = tempdir().unwrap();
        touch(dir.path(), ".gitignore", "target/\n*.bin\n");
        touch(dir.path(), "target/debug/app", "");
        touch(dir.path(), "src/a.py", "print(1)");
        touch(dir.path(), "src/data.bin", "xx");

        let matcher = IgnoreMatcher::new(dir.path()).unwrap();
        let structure = build_structure(dir.path(), &matcher).unwrap();

        assert!(structure.get("target").is_none());
        assert!(structure.get("src/data.bin").is_none());
        assert_eq!(structure.file_paths(), vec![".gitignore", "src/a.py"]);
    }

    #[test]
    fn test_ignored_directory_not_descended() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "skip/inner/file.txt", "");
        touch(dir.path(), "keep.txt", "");

        let visited = std::cell::RefCell::new(Vec::new());
        let predicate = |path: &Path, is_dir: bool| {
            visited.borrow_mut().push(path.to_path_buf());
            is_dir && path.ends_with("skip")
        };
        let structure = build_structure(dir.path(), &predicate).unwrap();

        assert_eq!(structure.file_paths(), vec!["keep.txt"]);
        assert!(!visited
            .borrow()
            .iter()
            .any(|p| p.ends_with("inner") || p.ends_with("file.txt")));
    }

    #[test]
    fn test_empty_directories_are_kept() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        assert!(structure.is_directory("empty"));
        assert!(structure.file_paths().is_empty());
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempdir().unwrap();
        let result = build_structure(&dir.path().join("nope"), &nothing_ignored);
        assert!(matches!(result, Err(Error::Unreadable { .. })));
    }

    #[test]
    fn test_absolute_path_lookup() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/b.txt", "b");

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        assert_eq!(structure.absolute_path("a/b.txt"), dir.path().join("a").join("b.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_outside_root_skipped() {
        let outside = tempdir().unwrap();
        touch(outside.path(), "secret.txt", "s");
        let dir = tempdir().unwrap();
        touch(dir.path(), "real.txt", "r");
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("leak.txt"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("leakdir")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        assert_eq!(structure.file_paths(), vec!["alias.txt", "real.txt"]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_skipped_with_subtree() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        touch(dir.path(), "ok.txt", "ok");
        let bad_file = dir.path().join(OsStr::from_bytes(b"bad\xff.txt"));
        fs::write(&bad_file, "x").unwrap();
        let bad_dir = dir.path().join(OsStr::from_bytes(b"dir\xfe"));
        fs::create_dir(&bad_dir).unwrap();
        fs::write(bad_dir.join("inner.txt"), "x").unwrap();

        let structure = build_structure(dir.path(), &nothing_ignored).unwrap();

        assert_eq!(structure.file_paths(), vec!["ok.txt"]);
        assert_eq!(structure.entries().len(), 1);
    }
}
