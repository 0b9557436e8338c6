use std::path::Path;
use std::time::{Duration, Instant};

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while cloning, scanning and exporting. Hidden when stderr is
/// not a terminal or when built with [`Progress::hidden`].
pub struct Progress {
    bar: ProgressBar,
    start: Instant,
    terminal_width: u16,
}

impl Progress {
    pub fn new() -> Self {
        let term = Term::stderr();
        if !term.is_term() {
            return Self::hidden();
        }
        let terminal_width = term.size().1;

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("valid template"),
        );
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            start: Instant::now(),
            terminal_width,
        }
    }

    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            start: Instant::now(),
            terminal_width: 80,
        }
    }

    pub fn cloning(&self, url: &str) {
        self.bar.set_message(format!("Cloning {}...", self.truncate(url)));
    }

    pub fn received(&self, received: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.bar.set_message(format!(
            "Receiving objects: {}% ({received}/{total})",
            received * 100 / total
        ));
    }

    pub fn switching(&self, branch: &str) {
        self.bar
            .set_message(format!("Checking out {}...", style(branch).cyan()));
    }

    pub fn scanning(&self) {
        self.bar.set_message("Scanning files...");
    }

    pub fn exporting(&self, path: &Path) {
        let shown = path.display().to_string();
        self.bar
            .set_message(format!("Reading: {}", self.truncate(&shown)));
    }

    pub fn finish(&self, summary: &str) {
        let elapsed = self.start.elapsed();
        self.bar.finish_with_message(format!(
            "{} {} in {:.1}s",
            style("Done").green(),
            summary,
            elapsed.as_secs_f64()
        ));
    }

    pub fn finish_clear(&self) {
        self.bar.finish_and_clear();
    }

    fn truncate(&self, text: &str) -> String {
        let max_len = (self.terminal_width as usize).saturating_sub(25).max(10);
        let len = text.chars().count();
        if len <= max_len {
            return text.to_string();
        }
        let tail: String = text.chars().skip(len - (max_len - 3)).collect();
        format!("...{tail}")
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_tail() {
        let progress = Progress::hidden();
        let long = format!("https://example.com/{}", "a".repeat(200));

        let shown = progress.truncate(&long);

        assert!(shown.starts_with("..."));
        assert!(shown.ends_with('a'));
        assert_eq!(shown.chars().count(), 55);
    }

    #[test]
    fn test_short_text_untouched() {
        let progress = Progress::hidden();
        assert_eq!(progress.truncate("src/a.py"), "src/a.py");
    }
}
