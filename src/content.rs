use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::config::Config;

pub const BINARY_MARKER: &str = "Binary file - contents omitted";

pub static TEXT_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "txt", "md", "markdown", "rst", "py", "rs", "js", "jsx", "ts", "tsx", "json", "toml",
        "yaml", "yml", "ini", "cfg", "conf", "sh", "bash", "zsh", "c", "h", "cpp", "hpp", "cc",
        "java", "kt", "go", "rb", "php", "html", "htm", "css", "scss", "xml", "sql", "csv", "tsv",
        "lua", "pl", "swift", "cs", "gitignore", "gitattributes", "dockerfile", "makefile",
        "cmake", "gradle", "properties", "env", "lock",
    ]
    .into_iter()
    .collect()
});

/// Result of reading one file for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text {
        content: String,
        encoding: &'static str,
    },
    Binary,
}

impl FileContent {
    pub fn is_binary(&self) -> bool {
        matches!(self, FileContent::Binary)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text { content, .. } => Some(content),
            FileContent::Binary => None,
        }
    }
}

impl fmt::Display for FileContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileContent::Text { content, .. } => f.write_str(content),
            FileContent::Binary => f.write_str(BINARY_MARKER),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentClassifier {
    max_size: u64,
    sample_size: usize,
    confidence_threshold: f32,
    extra_extensions: HashSet<String>,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ContentClassifier {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_size: config.max_text_size,
            sample_size: config.sample_size,
            confidence_threshold: config.confidence_threshold,
            extra_extensions: config
                .extra_text_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Reads `path` as text when it looks like text. Never fails: unreadable
    /// files and anything undecodable come back as [`FileContent::Binary`].
    pub fn read_content(&self, path: &Path) -> FileContent {
        let size = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot stat file");
                return FileContent::Binary;
            }
        };

        if size > self.max_size {
            debug!(path = %path.display(), size, "over size limit");
            return FileContent::Binary;
        }

        if size == 0 {
            return FileContent::Text {
                content: String::new(),
                encoding: encoding_rs::UTF_8.name(),
            };
        }

        if self.is_listed_text(path) {
            match fs::read(path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(content) => {
                        return FileContent::Text {
                            content,
                            encoding: encoding_rs::UTF_8.name(),
                        }
                    }
                    Err(_) => debug!(path = %path.display(), "listed extension but not utf-8"),
                },
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot read file");
                    return FileContent::Binary;
                }
            }
        }

        self.detect_and_decode(path)
    }

    fn detect_and_decode(&self, path: &Path) -> FileContent {
        let sample = match read_sample(path, self.sample_size) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read file");
                return FileContent::Binary;
            }
        };

        if content_inspector::inspect(&sample).is_binary() {
            debug!(path = %path.display(), "binary bytes in sample");
            return FileContent::Binary;
        }

        let Some(charset) = self.detect_charset(&sample) else {
            debug!(path = %path.display(), "no confident encoding");
            return FileContent::Binary;
        };

        match fs::read(path) {
            Ok(bytes) => decode(&bytes, charset),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read file");
                FileContent::Binary
            }
        }
    }

    // chardet takes `&Vec<u8>`
    #[allow(clippy::ptr_arg)]
    fn detect_charset(&self, sample: &Vec<u8>) -> Option<Charset> {
        let (charset, confidence, _language) = chardet::detect(sample);
        if charset.is_empty() || confidence <= self.confidence_threshold {
            debug!(charset = %charset, confidence, "rejected charset guess");
            return None;
        }

        // encoding_rs maps the "ascii" label to windows-1252, which accepts any byte.
        if charset.eq_ignore_ascii_case("ascii") {
            return Some(Charset::Ascii);
        }

        let label = chardet::charset2encoding(&charset);
        Encoding::for_label(label.as_bytes())
            .or_else(|| Encoding::for_label(charset.as_bytes()))
            .map(Charset::Encoding)
    }

    fn is_listed_text(&self, path: &Path) -> bool {
        let key = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.trim_start_matches('.').to_lowercase(),
                None => return false,
            },
        };

        TEXT_EXTENSIONS.contains(key.as_str()) || self.extra_extensions.contains(&key)
    }
}

fn read_sample(path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Ascii,
    Encoding(&'static Encoding),
}

/// Strict decode of the whole file. Any byte the charset cannot represent
/// turns the file into [`FileContent::Binary`].
fn decode(bytes: &[u8], charset: Charset) -> FileContent {
    match charset {
        Charset::Ascii => {
            if !bytes.is_ascii() {
                debug!("non-ascii bytes past the detection sample");
                return FileContent::Binary;
            }
            match String::from_utf8(bytes.to_vec()) {
                Ok(content) => FileContent::Text {
                    content,
                    encoding: "ascii",
                },
                Err(_) => FileContent::Binary,
            }
        }
        Charset::Encoding(detected) => {
            let (encoding, body) = match Encoding::for_bom(bytes) {
                Some((bom_encoding, bom_len)) => (bom_encoding, &bytes[bom_len..]),
                None => (detected, bytes),
            };
            match encoding.decode_without_bom_handling_and_without_replacement(body) {
                Some(content) => FileContent::Text {
                    content: content.into_owned(),
                    encoding: encoding.name(),
                },
                None => {
                    debug!(encoding = encoding.name(), "undecodable bytes");
                    FileContent::Binary
                }
            }
        }
    }
}

/// Convenience wrapper using the default thresholds.
pub fn read_content(path: &Path) -> FileContent {
    ContentClassifier::default().read_content(path)
}
