//! Error types for hytale-dev

use std::path::PathBuf;
use thiserror::Error;

/// Result type for hytale-dev operations
pub type Result<T> = std::result::Result<T, HytaleDevError>;

/// hytale-dev error types
#[derive(Debug, Error)]
pub enum HytaleDevError {
    /// local.properties is missing a required value or holds an invalid one
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Game installation or one of its required files is absent
    #[error("Hytale installation not found for version '{version}': {reason}. Searched in: {searched}")]
    InstallationNotFound {
        version: String,
        searched: String,
        reason: String,
    },

    /// Server process could not be started
    #[error("Failed to launch server: {0}")]
    Launch(String),

    /// Filesystem error while reading config or provisioning the run directory
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HytaleDevError {
    /// Wrap an I/O error together with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HytaleDevError::Io {
            path: path.into(),
            source,
        }
    }
}
