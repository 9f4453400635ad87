use core_protection::ProtectionError;
use std::path::PathBuf;
use thiserror::Error;

/// Main errors for the `app-utils` crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing failed
    #[error("YAML parsing failed: {0}")]
    YamlParseError(String),

    /// TOML parsing failed
    #[error("TOML parsing failed: {0}")]
    TomlParseError(String),

    /// Rule file or policy file could not be loaded
    #[error(transparent)]
    Protection(#[from] ProtectionError),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
