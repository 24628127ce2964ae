//! # Configuration
//!
//! Optional TOML file read at startup:
//!
//! ```toml
//! database = "ratio.redb"
//! backend = "redb"            # or "memory"
//! template = "trial.template" # seeds every new record
//!
//! [identity]
//! name = "alice"
//! uri = "http://example.org/users/alice"
//! ```
//!
//! A missing file yields the defaults. Command-line flags win over file
//! values.

use clap::ValueEnum;
use ratio_core::RatioError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Database path used when neither the file nor the flags name one.
pub const DEFAULT_DATABASE: &str = "ratio.redb";

// =============================================================================
// FILE FORMAT
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database file.
    #[default]
    Redb,
    /// Nothing outlives the invocation.
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::Memory => "memory",
        })
    }
}

/// The acting user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identity {
    pub name: String,
    pub uri: String,
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub template: Option<PathBuf>,
    pub identity: Option<Identity>,
}

impl Config {
    /// Read `path`; a missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self, RatioError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            RatioError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, RatioError> {
        toml::from_str(text).map_err(|e| RatioError::DeserializationError(e.to_string()))
    }
}

// =============================================================================
// EFFECTIVE SETTINGS
// =============================================================================

/// Configuration after flags have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: Backend,
    pub template: Option<PathBuf>,
    pub identity: Option<Identity>,
    pub json_mode: bool,
}

impl Settings {
    /// Merge `config` with the command-line overrides.
    #[must_use]
    pub fn resolve(
        config: Config,
        database: Option<PathBuf>,
        backend: Option<Backend>,
        json_mode: bool,
    ) -> Self {
        Self {
            database: database
                .or(config.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            backend: backend.or(config.backend).unwrap_or_default(),
            template: config.template,
            identity: config.identity,
            json_mode,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
