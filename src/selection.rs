use std::collections::BTreeSet;

use crate::structure::{Node, RepoStructure};

/// Derived display state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Selected,
    Partial,
    Deselected,
}

/// The set of file paths chosen for export. Directories never appear here;
/// their state is derived from their descendants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    files: BTreeSet<String>,
}

impl Selection {
    /// Every file in `structure` selected, the state after a fresh load.
    pub fn all(structure: &RepoStructure) -> Self {
        Self {
            files: structure.file_paths().into_iter().map(str::to_string).collect(),
        }
    }

    pub fn reset(&mut self, structure: &RepoStructure) {
        *self = Self::all(structure);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains(path)
    }

    /// Selected paths in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Toggles the node at `path`. Returns `false` when no such node exists.
    pub fn toggle(&mut self, structure: &RepoStructure, path: &str) -> bool {
        match structure.get(path) {
            Some(node) => {
                self.toggle_node(node);
                true
            }
            None => false,
        }
    }

    /// A file flips. A directory with any selected descendant is fully
    /// deselected, otherwise fully selected.
    pub fn toggle_node(&mut self, node: &Node) {
        let select = match node {
            Node::File(file) => !self.files.contains(&file.path),
            Node::Directory(_) => !self.any_selected(node),
        };
        self.set_node(node, select);
    }

    pub fn set_node(&mut self, node: &Node, selected: bool) {
        for path in node.file_paths() {
            if selected {
                self.files.insert(path.to_string());
            } else {
                self.files.remove(path);
            }
        }
    }

    pub fn any_selected(&self, node: &Node) -> bool {
        node.file_paths().iter().any(|p| self.files.contains(*p))
    }

    pub fn mark(&self, node: &Node) -> Mark {
        let paths = node.file_paths();
        let selected = paths.iter().filter(|p| self.files.contains(**p)).count();
        if selected == 0 {
            Mark::Deselected
        } else if selected == paths.len() {
            Mark::Selected
        } else {
            Mark::Partial
        }
    }
}
