//! Configuration error types

use thiserror::Error;

/// Error raised when a configuration value fails validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("Invalid configuration for class {class}: {source}")]
    InClass {
        class: String,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("Unknown operation class: {0}")]
    UnknownClass(String),
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::Invalid`] on `field`
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { field, message: message.into() }
    }

    /// Attach the operation class a validation error belongs to
    pub fn in_class(class: impl Into<String>, source: ConfigError) -> Self {
        Self::InClass { class: class.into(), source: Box::new(source) }
    }
}

/// Result type alias for configuration validation
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
