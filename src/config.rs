// Configuration loading and validation (bullpen.toml).

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::idempotency::DEFAULT_TTL_HOURS;
use crate::standings::ratings::DEFAULT_ELO_K;

/// File looked for in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bullpen.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Every section is optional in the file; missing sections and fields take
/// their defaults, so an empty file and no file behave identically.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSection,
    pub ratings: RatingsSection,
    pub idempotency: IdempotencySection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Explicit database file; the platform data directory when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RatingsSection {
    /// Elo K-factor applied when a query does not override it.
    pub elo_k: f64,
}

impl Default for RatingsSection {
    fn default() -> Self {
        Self { elo_k: DEFAULT_ELO_K }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdempotencySection {
    /// Hours a cached close response stays replayable.
    pub ttl_hours: u64,
}

impl Default for IdempotencySection {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_TTL_HOURS,
        }
    }
}

impl Config {
    /// Database file location: the configured path, or `bullpen.db` under
    /// the platform data directory.
    pub fn db_path(&self) -> PathBuf {
        match &self.database.path {
            Some(path) => path.clone(),
            None => default_data_dir().join("bullpen.db"),
        }
    }
}

/// Per-platform data directory, falling back to the working directory when
/// the platform reports none.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "league-manager")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from a specific file.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from an explicit file, else from `bullpen.toml` in
/// the working directory, else built-in defaults. Only the explicit path is
/// required to exist.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_from(path),
        None => {
            let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
            if implicit.exists() {
                load_from(&implicit)
            } else {
                Ok(Config::default())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if let Some(path) = &config.database.path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
    }

    let k = config.ratings.elo_k;
    if !(k > 0.0) {
        return Err(ConfigError::ValidationError {
            field: "ratings.elo_k".into(),
            message: format!("must be > 0, got {k}"),
        });
    }

    if config.idempotency.ttl_hours == 0 {
        return Err(ConfigError::ValidationError {
            field: "idempotency.ttl_hours".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
