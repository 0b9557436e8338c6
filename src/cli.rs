use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "repoflat",
    about = "Flatten a git repository into a single text report",
    version
)]
pub struct Cli {
    /// Local git checkout or remote repository URL
    #[arg(required_unless_present = "config_path")]
    pub source: Option<String>,

    /// Branch to export (overrides a branch embedded in the URL)
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Report file to write
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Pick files interactively before exporting
    #[arg(short, long)]
    pub interactive: bool,

    /// Print the report to stdout instead of writing a file
    #[arg(short, long, conflicts_with = "output")]
    pub print: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the config file location and exit
    #[arg(long)]
    pub config_path: bool,
}
