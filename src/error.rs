//! Error types for envprovision operations

use thiserror::Error;

/// The main error type for envprovision operations
///
/// Only startup and configuration problems surface here. Failures of a single
/// `env add` call are reported as [`crate::CallOutcome`] values instead.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("User interaction error: {0}")]
    InquireError(#[from] inquire::InquireError),
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("Variable '{0}' is declared more than once")]
    DuplicateVariable(String),
    #[error(
        "Variable '{name}' reads its value from ${key}, but ${key} is not set (checked the process environment and .env)"
    )]
    MissingEnvValue { name: String, key: String },
    #[error("Timeout of {0}s is out of range (1 to 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Manifest not found: {0}")]
    NoManifest(String),
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// A type alias for `Result<T, ProvisionError>`
pub type Result<T> = std::result::Result<T, ProvisionError>;
