//! Runtime configuration for catalog storage and logging.
//!
//! # Responsibility
//! - Describe where catalog predicates are persisted.
//! - Resolve defaults and environment overrides.
//!
//! # Invariants
//! - Every predicate without an override shares `catalog_file`.
//! - Overrides may only name catalog predicates.

use crate::catalog::is_catalog_predicate;
use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default shared catalog file name.
pub const DEFAULT_CATALOG_FILE: &str = "prolog.pl";
/// Environment variable overriding `catalog_file`.
pub const ENV_CATALOG_FILE: &str = "SYMCHECK_CATALOG_FILE";
/// Environment variable overriding `log_level`.
pub const ENV_LOG_LEVEL: &str = "SYMCHECK_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyCatalogFile,
    UnknownPredicate(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCatalogFile => write!(f, "catalog_file cannot be empty"),
            Self::UnknownPredicate(name) => {
                write!(f, "file override for unknown predicate `{name}`")
            }
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {}

/// Storage and logging settings for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// File shared by every predicate without an override.
    pub catalog_file: PathBuf,
    /// Per-predicate file overrides.
    pub predicate_files: BTreeMap<String, PathBuf>,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            catalog_file: PathBuf::from(DEFAULT_CATALOG_FILE),
            predicate_files: BTreeMap::new(),
            log_level: default_log_level().to_string(),
        }
    }
}

impl CatalogConfig {
    /// Config with every predicate in one file.
    pub fn with_catalog_file(path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_file: path.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SYMCHECK_CATALOG_FILE` / `SYMCHECK_LOG_LEVEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`CatalogConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(file) = lookup(ENV_CATALOG_FILE) {
            config.catalog_file = PathBuf::from(file.trim());
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks paths, override names and log level; normalizes the level.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.catalog_file.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCatalogFile);
        }
        if let Some(unknown) = self
            .predicate_files
            .keys()
            .find(|name| !is_catalog_predicate(name))
        {
            return Err(ConfigError::UnknownPredicate(unknown.clone()));
        }
        self.log_level = normalize_level(&self.log_level)
            .map_err(ConfigError::InvalidLogLevel)?
            .to_string();
        Ok(())
    }

    /// Backing file for `predicate`.
    pub fn file_for(&self, predicate: &str) -> &Path {
        self.predicate_files
            .get(predicate)
            .unwrap_or(&self.catalog_file)
            .as_path()
    }
}
