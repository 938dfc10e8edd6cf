//! Audit trail configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Audit sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines audit file
    pub log_file: String,

    /// Mirror every event to stdout
    pub to_stdout: bool,

    /// SQLite database holding the append-only history
    pub database_url: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_file: "audit.json".to_string(),
            to_stdout: true,
            database_url: "sqlite://gantry_audit.db".to_string(),
        }
    }
}

impl Validatable for AuditConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.log_file.trim().is_empty() {
            return Err(crate::error::ConfigError::validation(
                self.domain_name(),
                "log_file",
                "audit log file path cannot be empty",
            ));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "audit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(AuditConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_log_file_rejected() {
        let config = AuditConfig {
            log_file: " ".to_string(),
            ..AuditConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
