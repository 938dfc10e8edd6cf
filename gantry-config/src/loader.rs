//! Configuration loading and environment variable handling

use crate::domains::GantryConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;

/// Configuration loader with environment variable support
///
/// The gateway's documented environment contract uses bare variable names
/// (`HOST`, `PORT`, `AUTH_ENABLED`, ...); each override is applied on top of
/// the file (or defaults) before validation.
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<GantryConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: GantryConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<GantryConfig> {
        let mut config = GantryConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<GantryConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut GantryConfig) -> ConfigResult<()> {
        if let Ok(host) = std::env::var("HOST") {
            config.gateway.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.gateway.port = parse_env("PORT", &port)?;
        }

        if let Ok(enabled) = std::env::var("AUTH_ENABLED") {
            config.auth.enabled = parse_env("AUTH_ENABLED", &enabled)?;
        }
        if let Ok(url) = std::env::var("KEYCLOAK_URL") {
            config.auth.keycloak_url = Some(url);
        }
        if let Ok(realm) = std::env::var("KEYCLOAK_REALM") {
            config.auth.keycloak_realm = realm;
        }
        if let Ok(url) = std::env::var("JWKS_URL") {
            config.auth.jwks_url = Some(url);
        }
        if let Ok(alg) = std::env::var("JWT_ALGORITHM") {
            config.auth.jwt_algorithm = alg;
        }
        if let Ok(aud) = std::env::var("JWT_AUDIENCE") {
            config.auth.jwt_audience = Some(aud);
        }
        if let Ok(ttl) = std::env::var("TOKEN_CACHE_TTL") {
            config.auth.token_cache_ttl = parse_env("TOKEN_CACHE_TTL", &ttl)?;
        }
        if let Ok(url) = std::env::var("MCP_RESOURCE_SERVER_URL") {
            config.auth.resource_server_url = url;
        }
        if let Ok(scopes) = std::env::var("MCP_REQUIRED_SCOPES") {
            config.auth.required_scopes = scopes;
        }

        if let Ok(file) = std::env::var("AUDIT_LOG_FILE") {
            config.audit.log_file = file;
        }
        if let Ok(stdout) = std::env::var("AUDIT_TO_STDOUT") {
            config.audit.to_stdout = parse_env("AUDIT_TO_STDOUT", &stdout)?;
        }

        if let Ok(timeout) = std::env::var("PROXY_TIMEOUT") {
            config.proxy.timeout = parse_env("PROXY_TIMEOUT", &timeout)?;
        }

        Ok(())
    }
}

fn parse_env<T>(name: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::EnvError(format!("invalid {}: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_from_empty_env() {
        temp_env::with_vars_unset(["HOST", "PORT", "AUTH_ENABLED", "PROXY_TIMEOUT"], || {
            let config = ConfigLoader::new().from_env().unwrap();
            assert_eq!(config.gateway.port, 8000);
            assert!(config.auth.enabled);
            assert_eq!(config.proxy.timeout, 60);
        });
    }

    #[test]
    fn env_overrides_win() {
        temp_env::with_vars(
            [
                ("PORT", Some("9100")),
                ("AUTH_ENABLED", Some("false")),
                ("MCP_REQUIRED_SCOPES", Some("mcp:tools mcp:admin")),
                ("PROXY_TIMEOUT", Some("15")),
            ],
            || {
                let config = ConfigLoader::new().from_env().unwrap();
                assert_eq!(config.gateway.port, 9100);
                assert!(!config.auth.enabled);
                assert_eq!(config.auth.required_scope_list(), vec!["mcp:tools", "mcp:admin"]);
                assert_eq!(config.proxy.timeout, 15);
            },
        );
    }

    #[test]
    fn bad_env_value_errors() {
        temp_env::with_vars([("PORT", Some("not-a-port"))], || {
            assert!(matches!(
                ConfigLoader::new().from_env(),
                Err(ConfigError::EnvError(_))
            ));
        });
    }

    #[test]
    fn file_plus_env_chain() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "gateway:\n  port: 8443\nauth:\n  enabled: false\nproxy:\n  timeout: 20\n"
        )
        .unwrap();

        temp_env::with_vars([("PORT", Some("9200"))], || {
            let config = ConfigLoader::new().from_file(file.path()).unwrap();
            // Env override beats the file; untouched fields come from the file.
            assert_eq!(config.gateway.port, 9200);
            assert!(!config.auth.enabled);
            assert_eq!(config.proxy.timeout, 20);
        });
    }
}
