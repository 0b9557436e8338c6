pub mod config;
pub mod content;
pub mod error;
pub mod file_picker;
pub mod git_processor;
pub mod ignore_matcher;
pub mod output;
pub mod progress;
pub mod repository;
pub mod selection;
pub mod structure;

pub use config::{get_config_path, load_config, load_config_from, Config};
pub use content::{read_content, ContentClassifier, FileContent, BINARY_MARKER};
pub use error::{Error, Result};
pub use file_picker::{FilePicker, PickerOutcome};
pub use git_processor::{GitProcessor, RemoteSource};
pub use ignore_matcher::{IgnoreMatcher, IgnorePredicate};
pub use output::ReportWriter;
pub use progress::Progress;
pub use repository::{process_repository, LoadedRepository};
pub use selection::{Mark, Selection};
pub use structure::{build_structure, Node, RepoStructure};
