use crate::record::RecordMode;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "HASHCHECK_CONFIG";
pub const DEFAULT_SAMPLE_RATE: f64 = 0.01;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid sample rate {0}: must be greater than 0 and at most 1")]
    InvalidSampleRate(f64),
}

/// Settings read from an optional TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub mode: RecordMode,
    pub sample_rate: f64,
    pub sample_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: RecordMode::Hash,
            sample_rate: DEFAULT_SAMPLE_RATE,
            sample_seed: None,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        validate_sample_rate(config.sample_rate)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_toml(&content)
    }

    /// Loads the file named on the command line, else the one named by
    /// `HASHCHECK_CONFIG`, else returns defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

pub fn validate_sample_rate(rate: f64) -> Result<f64, ConfigError> {
    if rate > 0.0 && rate <= 1.0 {
        Ok(rate)
    } else {
        Err(ConfigError::InvalidSampleRate(rate))
    }
}
