use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_text_size")]
    pub max_text_size: u64,

    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    #[serde(default)]
    pub extra_text_extensions: Vec<String>,

    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_text_size: default_max_text_size(),
            sample_size: default_sample_size(),
            confidence_threshold: default_confidence_threshold(),
            extra_text_extensions: Vec::new(),
            output_file: default_output_file(),
        }
    }
}

fn default_max_text_size() -> u64 {
    1024 * 1024 // 1MiB
}

fn default_sample_size() -> usize {
    64 * 1024
}

fn default_confidence_threshold() -> f32 {
    0.8
}

fn default_output_file() -> PathBuf {
    PathBuf::from("repo_contents.txt")
}

/// Loads the user config, writing a default one on first run.
pub fn load_config() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        let config = Config::default();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config_str =
            toml::to_string_pretty(&config).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&config_path, config_str)?;
        return Ok(config);
    }

    load_config_from(&config_path)
}

/// Reads a config file without touching the filesystem when it is missing.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let config_str = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

    if !(0.0..=1.0).contains(&config.confidence_threshold) {
        return Err(Error::Config(format!(
            "confidence_threshold must be within 0.0..=1.0, got {}",
            config.confidence_threshold
        )));
    }

    if config.sample_size == 0 {
        return Err(Error::Config("sample_size must be greater than 0".to_string()));
    }

    Ok(config)
}

pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?
        .join("repoflat");
    Ok(config_dir.join("config.toml"))
}
