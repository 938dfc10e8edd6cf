//! Shared validation helpers for configuration domains

use crate::error::{ConfigError, ConfigResult};

/// Trait implemented by every configuration domain
pub trait Validatable {
    /// Validate this domain's configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Domain name used in error messages
    fn domain_name(&self) -> &'static str;
}

/// Validate that a value is one of the allowed choices
pub fn validate_enum_choice(
    value: &str,
    choices: &[&str],
    field: &str,
    domain: &'static str,
) -> ConfigResult<()> {
    if choices.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::validation(
            domain,
            field,
            format!("'{}' is not one of {:?}", value, choices),
        ))
    }
}

/// Validate a TCP port is outside the reserved range
pub fn validate_port_range(port: u16, field: &str, domain: &'static str) -> ConfigResult<()> {
    if port < 1024 {
        Err(ConfigError::validation(
            domain,
            field,
            format!("port {} is in the reserved range (< 1024)", port),
        ))
    } else {
        Ok(())
    }
}

/// Validate that a string parses as an http(s) URL
pub fn validate_http_url(value: &str, field: &str, domain: &'static str) -> ConfigResult<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::validation(domain, field, format!("invalid URL: {}", e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::validation(
            domain,
            field,
            format!("unsupported URL scheme '{}'", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_choice() {
        assert!(validate_enum_choice("sse", &["sse", "streamable_http"], "transport", "upstream").is_ok());
        assert!(validate_enum_choice("grpc", &["sse", "streamable_http"], "transport", "upstream").is_err());
    }

    #[test]
    fn port_range() {
        assert!(validate_port_range(8000, "port", "gateway").is_ok());
        assert!(validate_port_range(80, "port", "gateway").is_err());
    }

    #[test]
    fn http_url() {
        assert!(validate_http_url("http://localhost:3000/mcp", "url", "upstream").is_ok());
        assert!(validate_http_url("ftp://example.com", "url", "upstream").is_err());
        assert!(validate_http_url("not a url", "url", "upstream").is_err());
    }
}
