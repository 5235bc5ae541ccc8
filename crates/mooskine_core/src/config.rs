//! Store configuration.
//!
//! # Responsibility
//! - Describe where the persistent store lives and how often it autosaves.
//! - Load that description from JSON.
//!
//! # Invariants
//! - `model_name` is non-empty and is a bare file stem (no path separators).
//! - A missing `directory` selects an in-memory store.

use crate::autosave::DEFAULT_AUTOSAVE_INTERVAL_SECS;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_NAME: &str = "Mooskine";
const STORE_FILE_EXTENSION: &str = "sqlite";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Settings for opening a store and running its autosave loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store name; the file is `<directory>/<model_name>.sqlite`.
    pub model_name: String,
    /// Directory holding the store file. `None` keeps the store in memory.
    pub directory: Option<PathBuf>,
    /// Autosave cadence in seconds. Values `<= 0` disable autosave.
    pub autosave_interval_secs: f64,
    /// Optional log level for `init_logging`.
    pub log_level: Option<String>,
    /// Optional absolute log directory for `init_logging`.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            directory: None,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL_SECS,
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Config for an on-disk store named `model_name` inside `directory`.
    pub fn on_disk(directory: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            directory: Some(directory.into()),
            ..Self::default()
        }
    }

    pub fn from_json_str(value: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let name = self.model_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("model_name cannot be empty".to_string()));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Invalid(format!(
                "model_name must be a plain name, got `{name}`"
            )));
        }
        if self.autosave_interval_secs.is_nan() {
            return Err(ConfigError::Invalid(
                "autosave_interval_secs must be a number".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved store file path, or `None` for an in-memory store.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.directory.as_ref().map(|directory| {
            directory.join(format!(
                "{}.{STORE_FILE_EXTENSION}",
                self.model_name.trim()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_json_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.model_name, "Mooskine");
        assert_eq!(config.autosave_interval_secs, 30.0);
        assert!(config.store_path().is_none());
    }

    #[test]
    fn store_path_joins_directory_and_model_name() {
        let config = StoreConfig::from_json_str(
            r#"{"model_name": "Notes", "directory": "/var/lib/mooskine", "autosave_interval_secs": 5}"#,
        )
        .unwrap();
        assert_eq!(
            config.store_path(),
            Some(PathBuf::from("/var/lib/mooskine/Notes.sqlite"))
        );
        assert_eq!(config.autosave_interval_secs, 5.0);
    }

    #[test]
    fn rejects_model_name_with_path_separator() {
        let err = StoreConfig::from_json_str(r#"{"model_name": "../escape"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = StoreConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reports_missing_path() {
        let err = StoreConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
