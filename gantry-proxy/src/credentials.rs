//! Credential resolution and formatting
//!
//! Credential references are resolved at request time so rotated secrets are
//! picked up without a reload. Supported schemes: `env://VAR`,
//! `file:///path`. The `vault://` scheme is reserved and fails with an
//! explicit diagnostic.

use gantry_config::{AuthFormat, AuthLocation, AuthMethod, AuthSpec};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Credential resolution errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("environment variable '{0}' not found")]
    EnvMissing(String),

    #[error("failed to read credential from file '{path}': {detail}")]
    FileUnreadable { path: String, detail: String },

    #[error("vault credential references are not implemented; use env:// or file://")]
    VaultUnimplemented,

    #[error("unknown credential reference scheme: {0}")]
    UnknownScheme(String),

    #[error("template format requires a 'template' field")]
    TemplateMissing,
}

/// Resolve a credential reference to the secret material
pub fn resolve_credential(credential_ref: &str) -> Result<String, CredentialError> {
    if let Some(var) = credential_ref.strip_prefix("env://") {
        return std::env::var(var).map_err(|_| CredentialError::EnvMissing(var.to_string()));
    }

    if let Some(path) = credential_ref.strip_prefix("file://") {
        return std::fs::read_to_string(path)
            .map(|content| content.trim().to_string())
            .map_err(|e| CredentialError::FileUnreadable {
                path: path.to_string(),
                detail: e.to_string(),
            });
    }

    if credential_ref.starts_with("vault://") {
        return Err(CredentialError::VaultUnimplemented);
    }

    Err(CredentialError::UnknownScheme(credential_ref.to_string()))
}

/// Produce the final parameter value from the raw credential
pub fn format_credential(spec: &AuthSpec, credential: &str) -> Result<String, CredentialError> {
    match spec.format {
        AuthFormat::Raw => Ok(credential.to_string()),
        AuthFormat::Prefix => Ok(format!("{}{}", spec.prefix.as_deref().unwrap_or(""), credential)),
        AuthFormat::Template => {
            let template = spec.template.as_deref().ok_or(CredentialError::TemplateMissing)?;
            Ok(template.replace("{credential}", credential))
        }
    }
}

/// Authentication material placed on an outbound session
#[derive(Debug, Clone, Default)]
pub struct AppliedAuth {
    /// Extra request headers
    pub headers: Vec<(String, String)>,

    /// Extra query parameters
    pub query: Vec<(String, String)>,

    /// Key merged into the JSON envelope of POST-shaped requests
    pub body: Option<(String, Value)>,
}

impl AppliedAuth {
    /// Materialise an upstream's auth spec into request parts
    ///
    /// Returns the empty set when no credential is configured or the method
    /// is `none`.
    pub fn from_spec(spec: Option<&AuthSpec>) -> Result<Self, CredentialError> {
        let Some(spec) = spec else {
            return Ok(Self::default());
        };
        if spec.method == AuthMethod::None {
            return Ok(Self::default());
        }

        let credential = if let Some(value) = &spec.credential_value {
            warn!("upstream auth uses an inline credential_value; prefer a credential_ref");
            value.clone()
        } else if let Some(reference) = &spec.credential_ref {
            resolve_credential(reference)?
        } else {
            return Ok(Self::default());
        };

        let formatted = format_credential(spec, &credential)?;

        let mut applied = Self::default();
        match spec.location {
            AuthLocation::Header => applied.headers.push((spec.name.clone(), formatted)),
            AuthLocation::Query => applied.query.push((spec.name.clone(), formatted)),
            AuthLocation::Body => applied.body = Some((spec.name.clone(), Value::String(formatted))),
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_config::{AuthFormat, AuthLocation, AuthMethod};
    use std::io::Write;

    fn spec(location: AuthLocation, format: AuthFormat) -> AuthSpec {
        AuthSpec {
            method: AuthMethod::Bearer,
            location,
            name: "Authorization".to_string(),
            format,
            prefix: Some("Bearer ".to_string()),
            template: None,
            credential_ref: Some("env://UPSTREAM_TOKEN".to_string()),
            credential_value: None,
        }
    }

    #[test]
    fn env_reference_resolution() {
        temp_env::with_var("UPSTREAM_TOKEN", Some("abc123"), || {
            assert_eq!(resolve_credential("env://UPSTREAM_TOKEN").unwrap(), "abc123");
        });
        temp_env::with_var_unset("UPSTREAM_TOKEN", || {
            assert!(matches!(
                resolve_credential("env://UPSTREAM_TOKEN"),
                Err(CredentialError::EnvMissing(_))
            ));
        });
    }

    #[test]
    fn file_reference_trims_trailing_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "s3cr3t").unwrap();
        let reference = format!("file://{}", file.path().display());
        assert_eq!(resolve_credential(&reference).unwrap(), "s3cr3t");
    }

    #[test]
    fn vault_reference_is_a_known_error() {
        let err = resolve_credential("vault://kv/mcp/token").unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(matches!(
            resolve_credential("s3://bucket/key"),
            Err(CredentialError::UnknownScheme(_))
        ));
    }

    #[test]
    fn prefix_and_template_formatting() {
        let prefixed = spec(AuthLocation::Header, AuthFormat::Prefix);
        assert_eq!(format_credential(&prefixed, "abc").unwrap(), "Bearer abc");

        let mut templated = spec(AuthLocation::Header, AuthFormat::Template);
        templated.template = Some("Token {credential};v=1".to_string());
        assert_eq!(format_credential(&templated, "abc").unwrap(), "Token abc;v=1");
    }

    #[test]
    fn bearer_header_lands_in_headers() {
        temp_env::with_var("UPSTREAM_TOKEN", Some("abc123"), || {
            let applied = AppliedAuth::from_spec(Some(&spec(AuthLocation::Header, AuthFormat::Prefix))).unwrap();
            assert_eq!(
                applied.headers,
                vec![("Authorization".to_string(), "Bearer abc123".to_string())]
            );
            assert!(applied.query.is_empty());
            assert!(applied.body.is_none());
        });
    }

    #[test]
    fn body_credential_prepared_for_merge() {
        temp_env::with_var("UPSTREAM_TOKEN", Some("k"), || {
            let mut s = spec(AuthLocation::Body, AuthFormat::Raw);
            s.name = "api_key".to_string();
            let applied = AppliedAuth::from_spec(Some(&s)).unwrap();
            assert_eq!(applied.body, Some(("api_key".to_string(), Value::String("k".to_string()))));
        });
    }

    #[test]
    fn no_spec_means_no_auth() {
        let applied = AppliedAuth::from_spec(None).unwrap();
        assert!(applied.headers.is_empty() && applied.query.is_empty() && applied.body.is_none());
    }
}
