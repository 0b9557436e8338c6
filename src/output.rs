use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, instrument};

use crate::content::ContentClassifier;
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::selection::Selection;
use crate::structure::{Entries, Node, RepoStructure};

pub const STRUCTURE_HEADER: &str = "Directory structure:";
pub const CONTENT_HEADER: &str = "Files Content:";
const SEPARATOR_WIDTH: usize = 48;
const INDENT: &str = "    ";

/// Writes the two-part report: the directory tree, then every selected file.
pub struct ReportWriter<'a> {
    structure: &'a RepoStructure,
    selection: &'a Selection,
    classifier: &'a ContentClassifier,
}

impl<'a> ReportWriter<'a> {
    pub fn new(
        structure: &'a RepoStructure,
        selection: &'a Selection,
        classifier: &'a ContentClassifier,
    ) -> Self {
        Self {
            structure,
            selection,
            classifier,
        }
    }

    #[instrument(skip_all, fields(files = self.selection.len()))]
    pub fn write<W: Write>(&self, out: &mut W, progress: &Progress) -> Result<()> {
        if self.selection.is_empty() {
            return Err(Error::NothingSelected);
        }

        writeln!(out, "{STRUCTURE_HEADER}")?;
        write_tree(out, self.structure.entries(), "")?;

        write!(out, "\n{CONTENT_HEADER}\n")?;
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let mut binary = 0usize;
        for path in self.selection.iter() {
            let absolute = self.structure.absolute_path(path);
            progress.exporting(Path::new(path));
            let content = self.classifier.read_content(&absolute);
            if content.is_binary() {
                binary += 1;
            }
            write!(out, "\n{separator}\nFile: {path}\n{separator}\n")?;
            writeln!(out, "{content}")?;
        }

        out.flush()?;
        info!(binary, "report written");
        Ok(())
    }

    pub fn export_to_file(&self, path: &Path, progress: &Progress) -> Result<()> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        self.write(&mut out, progress)
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, &Progress::hidden())?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn write_tree<W: Write>(out: &mut W, entries: &Entries, prefix: &str) -> Result<()> {
    for (name, node) in entries {
        match node {
            Node::Directory(dir) => {
                writeln!(out, "{prefix}└── {name}/")?;
                write_tree(out, &dir.children, &format!("{prefix}{INDENT}"))?;
            }
            Node::File(_) => writeln!(out, "{prefix}{INDENT}├── {name}")?,
        }
    }
    Ok(())
}
