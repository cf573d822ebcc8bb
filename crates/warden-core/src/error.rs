//! Error types for the core crate.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Errors raised by the service registry.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A service with the same name is already registered.
    #[error("service already registered: {name}")]
    Duplicate { name: String },

    /// No service with that name.
    #[error("service not found: {name}")]
    NotFound { name: String },
}
