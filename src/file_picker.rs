use std::collections::HashSet;
use std::io::{self, stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Terminal,
};

use crate::selection::{Mark, Selection};
use crate::structure::{Entries, Node, RepoStructure};

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        stdout().execute(EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = stdout().execute(LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// How the picker was left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Save(Selection),
    Cancel,
}

#[derive(Debug, Clone)]
struct Row {
    path: String,
    name: String,
    depth: usize,
    is_dir: bool,
}

/// Collapsible tree view over a [`RepoStructure`] for toggling files in and out
/// of the export. Rows are identified by full path, never by rendered text.
pub struct FilePicker<'a> {
    structure: &'a RepoStructure,
    selection: Selection,
    expanded: HashSet<String>,
    rows: Vec<Row>,
    list_state: ListState,
    show_help: bool,
    status: Option<String>,
}

impl<'a> FilePicker<'a> {
    pub fn new(structure: &'a RepoStructure, selection: Selection) -> Self {
        let mut picker = Self {
            structure,
            selection,
            expanded: HashSet::new(),
            rows: Vec::new(),
            list_state: ListState::default(),
            show_help: false,
            status: None,
        };
        picker.refresh_rows();
        picker.list_state.select((!picker.rows.is_empty()).then_some(0));
        picker
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn run(&mut self) -> Result<PickerOutcome> {
        let _guard = TerminalGuard::new()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
        terminal.clear()?;

        let outcome = loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Some(outcome) = self.handle_key(key.code) {
                        break outcome;
                    }
                }
            }
        };

        terminal.clear()?;
        Ok(outcome)
    }

    /// Applies one key press. Returns `Some` when the picker should close.
    pub fn handle_key(&mut self, code: KeyCode) -> Option<PickerOutcome> {
        if self.show_help {
            if matches!(code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return None;
        }

        self.status = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Some(PickerOutcome::Cancel),
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => self.expand_current(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Backspace => self.collapse_current(),
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('a') => self.selection.reset(self.structure),
            KeyCode::Char('s') => {
                if self.selection.is_empty() {
                    self.status = Some("No files selected!".to_string());
                } else {
                    return Some(PickerOutcome::Save(self.selection.clone()));
                }
            }
            _ => {}
        }
        None
    }

    fn current_row(&self) -> Option<&Row> {
        self.list_state.selected().and_then(|i| self.rows.get(i))
    }

    fn current_node(&self) -> Option<&'a Node> {
        let structure = self.structure;
        self.current_row().and_then(|row| structure.get(&row.path))
    }

    fn toggle_current(&mut self) {
        if let Some(node) = self.current_node() {
            self.selection.toggle_node(node);
        }
    }

    fn expand_current(&mut self) {
        let Some(row) = self.current_row() else {
            return;
        };
        if row.is_dir {
            let path = row.path.clone();
            if !self.expanded.remove(&path) {
                self.expanded.insert(path);
            }
            self.refresh_rows();
        }
    }

    fn collapse_current(&mut self) {
        let Some(row) = self.current_row() else {
            return;
        };

        if row.is_dir && self.expanded.contains(&row.path) {
            let path = row.path.clone();
            self.expanded.remove(&path);
            self.refresh_rows();
            return;
        }

        // Jump to the parent directory row.
        if let Some((parent, _)) = row.path.rsplit_once('/') {
            let parent = parent.to_string();
            if let Some(index) = self.rows.iter().position(|r| r.path == parent) {
                self.list_state.select(Some(index));
            }
        }
    }

    fn refresh_rows(&mut self) {
        let keep = self.current_row().map(|row| row.path.clone());

        let mut rows = Vec::new();
        push_rows(self.structure.entries(), &self.expanded, 0, &mut rows);
        self.rows = rows;

        let index = keep
            .and_then(|path| self.rows.iter().position(|r| r.path == path))
            .or((!self.rows.is_empty()).then_some(0));
        self.list_state.select(index);
    }

    fn next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => self.rows.len() - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    fn ui(&self, f: &mut ratatui::Frame) {
        if self.show_help {
            self.draw_help(f);
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Repository root
                Constraint::Min(3),    // Tree
                Constraint::Length(1), // Status
            ])
            .split(f.area());

        let root = Paragraph::new(format!("📁 {}", self.structure.root().display()))
            .style(Style::default().fg(Color::Blue));
        f.render_widget(root, chunks[0]);

        let items: Vec<ListItem> = self.rows.iter().map(|row| self.render_row(row)).collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Files"))
            .highlight_style(Style::default().bg(Color::DarkGray));
        f.render_stateful_widget(list, chunks[1], &mut self.list_state.clone());

        let total = self.structure.file_paths().len();
        let status = match &self.status {
            Some(message) => Line::from(Span::styled(
                message.clone(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            None => Line::from(format!(
                "{} of {} files selected | space: toggle  s: save  q: quit  ?: help",
                self.selection.len(),
                total
            )),
        };
        f.render_widget(Paragraph::new(status), chunks[2]);
    }

    fn render_row(&self, row: &Row) -> ListItem<'static> {
        let mark = self
            .structure
            .get(&row.path)
            .map(|node| self.selection.mark(node))
            .unwrap_or(Mark::Deselected);
        let (check, check_style) = match mark {
            Mark::Selected => ("[x]", Style::default().fg(Color::Green)),
            Mark::Partial => ("[~]", Style::default().fg(Color::Yellow)),
            Mark::Deselected => ("[ ]", Style::default()),
        };

        let (icon, name_style) = if row.is_dir {
            let icon = if self.expanded.contains(&row.path) { "▾" } else { "▸" };
            (icon, Style::default().fg(Color::Blue))
        } else {
            (" ", Style::default())
        };

        ListItem::new(Line::from(vec![
            Span::raw("  ".repeat(row.depth)),
            Span::styled(check, check_style),
            Span::raw(" "),
            Span::styled(icon, name_style),
            Span::raw(" "),
            Span::styled(row.name.clone(), name_style),
        ]))
    }

    fn draw_help(&self, f: &mut ratatui::Frame) {
        let key = |k: &'static str| Line::from(Span::styled(k, Style::default().fg(Color::Yellow)));
        let text = vec![
            Line::from("Keybindings:"),
            Line::from(""),
            key("↓ / ↑ or j / k"),
            Line::from("  Move"),
            key("Enter / → / l"),
            Line::from("  Expand or collapse directory"),
            key("← / h / Backspace"),
            Line::from("  Collapse, or jump to parent"),
            key("Space"),
            Line::from("  Toggle file or whole directory"),
            key("a"),
            Line::from("  Select every file"),
            key("s"),
            Line::from("  Save report"),
            key("q / Esc"),
            Line::from("  Quit without saving"),
            key("?"),
            Line::from("  Toggle this help"),
            Line::from(""),
            Line::from(format!("Root Directory: {}", self.structure.root().display())),
        ];

        let help = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .alignment(ratatui::layout::Alignment::Left);

        let area = ratatui::layout::Rect {
            x: f.area().width / 4,
            y: f.area().height / 4,
            width: f.area().width / 2,
            height: f.area().height / 2,
        };

        f.render_widget(help, area);
    }
}

fn push_rows(entries: &Entries, expanded: &HashSet<String>, depth: usize, rows: &mut Vec<Row>) {
    for node in entries.values() {
        rows.push(Row {
            path: node.path().to_string(),
            name: node.name().to_string(),
            depth,
            is_dir: node.is_dir(),
        });
        if let Node::Directory(dir) = node {
            if expanded.contains(&dir.path) {
                push_rows(&dir.children, expanded, depth + 1, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::build_structure;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn fixture() -> (TempDir, RepoStructure) {
        let dir = tempdir().unwrap();
        for rel in ["README.md", "src/lib.rs", "src/main.rs"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        let structure = build_structure(dir.path(), &|_: &Path, _: bool| false).unwrap();
        (dir, structure)
    }

    fn row_paths(picker: &FilePicker) -> Vec<String> {
        picker.rows.iter().map(|r| r.path.clone()).collect()
    }

    #[test]
    fn test_starts_collapsed_with_everything_selected() {
        let (_dir, structure) = fixture();
        let picker = FilePicker::new(&structure, Selection::all(&structure));

        assert_eq!(row_paths(&picker), vec!["README.md", "src"]);
        assert_eq!(picker.selection().len(), 3);
    }

    #[test]
    fn test_expand_and_collapse() {
        let (_dir, structure) = fixture();
        let mut picker = FilePicker::new(&structure, Selection::all(&structure));

        picker.handle_key(KeyCode::Down);
        picker.handle_key(KeyCode::Enter);
        assert_eq!(
            row_paths(&picker),
            vec!["README.md", "src", "src/lib.rs", "src/main.rs"]
        );

        picker.handle_key(KeyCode::Down);
        picker.handle_key(KeyCode::Left);
        assert_eq!(picker.current_row().map(|r| r.path.as_str()), Some("src"));

        picker.handle_key(KeyCode::Left);
        assert_eq!(row_paths(&picker), vec!["README.md", "src"]);
    }

    #[test]
    fn test_space_toggles_directory_and_file() {
        let (_dir, structure) = fixture();
        let mut picker = FilePicker::new(&structure, Selection::all(&structure));

        picker.handle_key(KeyCode::Down);
        picker.handle_key(KeyCode::Char(' '));
        assert!(!picker.selection().contains("src/lib.rs"));
        assert!(!picker.selection().contains("src/main.rs"));
        assert!(picker.selection().contains("README.md"));

        picker.handle_key(KeyCode::Up);
        picker.handle_key(KeyCode::Char(' '));
        assert!(picker.selection().is_empty());
    }

    #[test]
    fn test_save_refused_when_empty() {
        let (_dir, structure) = fixture();
        let mut picker = FilePicker::new(&structure, Selection::default());

        assert_eq!(picker.handle_key(KeyCode::Char('s')), None);
        assert_eq!(picker.status.as_deref(), Some("No files selected!"));

        picker.handle_key(KeyCode::Char('a'));
        match picker.handle_key(KeyCode::Char('s')) {
            Some(PickerOutcome::Save(selection)) => assert_eq!(selection.len(), 3),
            other => panic!("expected save, got {other:?}"),
        }
    }

    #[test]
    fn test_quit_cancels() {
        let (_dir, structure) = fixture();
        let mut picker = FilePicker::new(&structure, Selection::all(&structure));

        assert_eq!(picker.handle_key(KeyCode::Char('q')), Some(PickerOutcome::Cancel));
    }

    #[test]
    fn test_help_swallows_keys() {
        let (_dir, structure) = fixture();
        let mut picker = FilePicker::new(&structure, Selection::all(&structure));

        picker.handle_key(KeyCode::Char('?'));
        assert_eq!(picker.handle_key(KeyCode::Char('q')), None);
        assert_eq!(picker.handle_key(KeyCode::Char('q')), Some(PickerOutcome::Cancel));
    }
}
