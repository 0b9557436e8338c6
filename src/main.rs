mod cli;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repoflat::{
    get_config_path, load_config, process_repository, ContentClassifier, FilePicker,
    GitProcessor, PickerOutcome, Progress, ReportWriter,
};

use crate::cli::Cli;

fn init_logging(verbose: bool) {
    // RUST_LOG takes precedence over --verbose.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    if args.config_path {
        let path = get_config_path()?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = load_config().context("failed to load configuration")?;
    let source = args
        .source
        .as_deref()
        .context("a repository path or URL is required")?;

    if !Path::new(source).is_dir() && !GitProcessor::is_git_url(source) {
        warn!(
            source,
            "not a local directory and not a recognised git url, trying to clone anyway"
        );
    }

    let progress = Progress::new();
    let repo = match process_repository(source, args.branch.as_deref(), &progress) {
        Ok(repo) => repo,
        Err(err) => {
            progress.finish_clear();
            return Err(err).with_context(|| format!("could not process '{source}'"));
        }
    };
    progress.finish_clear();

    let selection = if args.interactive {
        let mut picker = FilePicker::new(repo.structure(), repo.initial_selection());
        match picker.run()? {
            PickerOutcome::Save(selection) => selection,
            PickerOutcome::Cancel => {
                println!("Cancelled, nothing exported");
                repo.close();
                return Ok(());
            }
        }
    } else {
        repo.initial_selection()
    };

    let classifier = ContentClassifier::from_config(&config);
    let writer = ReportWriter::new(repo.structure(), &selection, &classifier);

    if args.print {
        let stdout = io::stdout();
        writer.write(&mut stdout.lock(), &Progress::hidden())?;
    } else {
        let output = args.output.clone().unwrap_or_else(|| config.output_file.clone());
        let progress = Progress::new();
        writer
            .export_to_file(&output, &progress)
            .with_context(|| format!("could not write {}", output.display()))?;
        progress.finish(&format!(
            "{} files written to {}",
            selection.len(),
            output.display()
        ));
    }

    repo.close();
    Ok(())
}
