//! Upstream MCP server descriptors and per-upstream authentication specs

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Transport an upstream session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// POST JSON-RPC, response as JSON or an SSE body
    StreamableHttp,

    /// Long-lived SSE stream plus a message POST endpoint
    Sse,
}

impl Default for TransportKind {
    fn default() -> Self {
        Self::StreamableHttp
    }
}

/// How the formatted credential reaches the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthLocation {
    Header,
    Query,
    Body,
}

/// Declared authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Bearer,
    Basic,
    Oauth2,
    Custom,
    None,
}

/// How the raw credential is turned into the final parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFormat {
    /// Use the credential as-is
    Raw,

    /// Prepend `prefix` (e.g. `Bearer `)
    Prefix,

    /// Substitute into `template`, which must contain `{credential}`
    Template,
}

impl Default for AuthFormat {
    fn default() -> Self {
        Self::Raw
    }
}

/// Per-upstream authentication specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSpec {
    /// Declared method; informational except for `none`
    pub method: AuthMethod,

    /// Where the credential goes
    #[serde(default = "default_location")]
    pub location: AuthLocation,

    /// Parameter name at that location (header name, query key, body key)
    pub name: String,

    /// Formatting applied to the raw credential
    #[serde(default)]
    pub format: AuthFormat,

    /// Prefix for `format = prefix`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Template for `format = template`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Credential reference (`env://`, `file://`, `vault://`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,

    /// Inline credential value; accepted but flagged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_value: Option<String>,
}

fn default_location() -> AuthLocation {
    AuthLocation::Header
}

impl AuthSpec {
    /// Structural validation: template presence, exclusive credential source
    pub fn validate(&self, server: &str) -> ConfigResult<()> {
        if self.format == AuthFormat::Template {
            match &self.template {
                Some(t) if t.contains("{credential}") => {}
                Some(_) => {
                    return Err(ConfigError::validation(
                        "upstream",
                        format!("{}.auth.template", server),
                        "template must contain '{credential}'",
                    ))
                }
                None => {
                    return Err(ConfigError::validation(
                        "upstream",
                        format!("{}.auth.template", server),
                        "template format requires a 'template' field",
                    ))
                }
            }
        }

        if self.credential_ref.is_some() && self.credential_value.is_some() {
            return Err(ConfigError::validation(
                "upstream",
                format!("{}.auth", server),
                "at most one of credential_ref and credential_value may be set",
            ));
        }

        if self.name.trim().is_empty() && self.method != AuthMethod::None {
            return Err(ConfigError::validation(
                "upstream",
                format!("{}.auth.name", server),
                "parameter name cannot be empty",
            ));
        }

        Ok(())
    }
}

/// Declared upstream MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// MCP endpoint URL
    pub url: String,

    /// Transport used for sessions
    #[serde(rename = "type", default)]
    pub transport: TransportKind,

    /// Session timeout in seconds; proxy default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Disabled upstreams stay registered but receive no traffic
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tags for broadcast grouping
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Tools this upstream declares; `["*"]` means "any"
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Operator metadata, passed through untouched
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Outbound authentication
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthSpec>,
}

fn default_enabled() -> bool {
    true
}

impl UpstreamConfig {
    /// Effective session timeout given the proxy default
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.map(Duration::from_secs).unwrap_or(default)
    }

    /// Whether this upstream claims to provide `tool`
    pub fn declares_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool || t == "*")
    }

    /// Structural validation
    pub fn validate(&self, name: &str) -> ConfigResult<()> {
        crate::validation::validate_http_url(&self.url, &format!("{}.url", name), "upstream")?;
        if let Some(auth) = &self.auth {
            auth.validate(name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bearer_spec() -> AuthSpec {
        AuthSpec {
            method: AuthMethod::Bearer,
            location: AuthLocation::Header,
            name: "Authorization".to_string(),
            format: AuthFormat::Prefix,
            prefix: Some("Bearer ".to_string()),
            template: None,
            credential_ref: Some("env://UPSTREAM_TOKEN".to_string()),
            credential_value: None,
        }
    }

    #[test]
    fn upstream_yaml_shape() {
        let yaml = r#"
url: http://localhost:3001/mcp
type: sse
timeout: 30
enabled: true
tags: [logging, search]
tools: ["echo", "search_logs"]
"#;
        let upstream: UpstreamConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(upstream.transport, TransportKind::Sse);
        assert_eq!(upstream.timeout, Some(30));
        assert!(upstream.tags.contains("logging"));
        assert!(upstream.declares_tool("echo"));
        assert!(!upstream.declares_tool("reboot"));
    }

    #[test]
    fn wildcard_tool_declaration() {
        let upstream: UpstreamConfig =
            serde_json::from_value(json!({"url": "http://localhost:3000/mcp", "tools": ["*"]})).unwrap();
        assert!(upstream.declares_tool("anything"));
    }

    #[test]
    fn auth_spec_template_requires_placeholder() {
        let mut spec = bearer_spec();
        spec.format = AuthFormat::Template;
        spec.template = Some("Token <here>".to_string());
        assert!(spec.validate("a").is_err());

        spec.template = Some("Token {credential}".to_string());
        assert!(spec.validate("a").is_ok());
    }

    #[test]
    fn auth_spec_rejects_two_credential_sources() {
        let mut spec = bearer_spec();
        spec.credential_value = Some("inline".to_string());
        assert!(spec.validate("a").is_err());
    }

    #[test]
    fn timeout_fallback() {
        let upstream: UpstreamConfig =
            serde_json::from_value(json!({"url": "http://localhost:3000/mcp"})).unwrap();
        assert_eq!(upstream.timeout_or(Duration::from_secs(60)), Duration::from_secs(60));
    }
}
