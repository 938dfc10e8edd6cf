//! Configuration error types

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading or writing a config file
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse or serialize error
    #[error("Config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid environment variable value
    #[error("Environment variable error: {0}")]
    EnvError(String),

    /// Domain validation failure
    #[error("Invalid {domain} config: {field}: {message}")]
    Validation {
        domain: &'static str,
        field: String,
        message: String,
    },

    /// Upstream server not present in the registry
    #[error("MCP server '{name}' is not configured")]
    UnknownServer { name: String },
}

impl ConfigError {
    /// Shorthand for a validation failure
    pub fn validation(domain: &'static str, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            domain,
            field: field.into(),
            message: message.into(),
        }
    }
}
