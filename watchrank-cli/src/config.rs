/// Config file loading and creation for the watchrank CLI.
///
/// Config lives at ~/.config/watchrank/config.toml.
/// All fields are optional; CLI args override config values.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bail;

#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchrankConfig {
    pub history: Option<PathBuf>,
    pub history_url: Option<String>,
    pub bind: Option<String>,
    pub cache_seconds: Option<u64>,
    #[serde(default)]
    pub logistic: LogisticSection,
}

/// `[logistic]` table. Unset values fall back to the solver defaults.
#[derive(Deserialize, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LogisticSection {
    pub learning_rate: Option<f64>,
    pub epochs: Option<usize>,
    pub batch_size: Option<usize>,
    pub validation_split: Option<f64>,
    pub backend: Option<String>,
    pub seed: Option<u64>,
}

const DEFAULT_CONFIG_TEMPLATE: &str = "\
# watchrank configuration
# All values here can be overridden by CLI flags.

# Watch history: a JSON array of {order, title, dateWatched, betterThanPrevious}.
# Either a local file...
# history = \"/path/to/movie-watch-history.json\"
# ...or a URL serving the same JSON.
# history_url = \"https://example.com/movie-watch-history.json\"

# Address for `watchrank serve`
# bind = \"127.0.0.1:3000\"

# How long computed ratings are served from memory before recomputing
# cache_seconds = 3600

[logistic]
# learning_rate = 0.01
# epochs = 100
# batch_size = 32
# Fraction of samples held out to log a validation loss (0.0 = off)
# validation_split = 0.0
# \"auto\", \"dense\" or \"sparse\"
# backend = \"auto\"
# Fixed seed for reproducible logistic scores
# seed = 42
";

/// Returns the default config path: ~/.config/watchrank/config.toml
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| bail("HOME environment variable not set"));
    PathBuf::from(home).join(".config").join("watchrank").join("config.toml")
}

pub fn parse_config(content: &str) -> Result<WatchrankConfig, toml::de::Error> {
    toml::from_str(content)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Read and parse the config at `path`. A missing file is all defaults.
pub fn try_load_config(path: &Path) -> Result<WatchrankConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(WatchrankConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Load config from a file path, exiting on unreadable or malformed files.
pub fn load_config(path: &Path) -> WatchrankConfig {
    try_load_config(path).unwrap_or_else(|e| bail(e))
}

/// Create the default config file. Errors if it already exists.
pub fn create_default_config() -> PathBuf {
    let path = config_path();

    if path.exists() {
        bail(format!("Config file already exists at {}", path.display()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| bail(format!("Failed to create directory {}: {e}", parent.display())));
    }

    std::fs::write(&path, DEFAULT_CONFIG_TEMPLATE)
        .unwrap_or_else(|e| bail(format!("Failed to write config to {}: {e}", path.display())));

    path
}
