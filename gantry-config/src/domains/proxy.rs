//! Upstream proxy defaults

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defaults applied to upstream MCP sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Session timeout in seconds when the upstream declares none
    pub timeout: u64,

    /// Verify upstream TLS certificates
    pub verify_ssl: bool,

    /// Cap on pooled connections per upstream host
    pub max_connections_per_host: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: 60,
            verify_ssl: true,
            max_connections_per_host: 8,
        }
    }
}

impl ProxyConfig {
    /// Default session timeout
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Validatable for ProxyConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.timeout == 0 {
            return Err(crate::error::ConfigError::validation(
                self.domain_name(),
                "timeout",
                "timeout must be at least one second",
            ));
        }
        if !(1..=64).contains(&self.max_connections_per_host) {
            return Err(crate::error::ConfigError::validation(
                self.domain_name(),
                "max_connections_per_host",
                "must be between 1 and 64",
            ));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "proxy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = ProxyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout_duration(), Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = ProxyConfig {
            timeout: 0,
            ..ProxyConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
