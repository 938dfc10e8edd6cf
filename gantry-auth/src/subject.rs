//! Authenticated caller identity
//!
//! A `Subject` is derived from a validated token's claims for the duration of
//! one request and never persisted.

use serde_json::Value;
use std::collections::BTreeSet;

/// Caller identity derived from verified token claims
#[derive(Debug, Clone)]
pub struct Subject {
    /// Stable subject identifier (`sub`)
    pub subject_id: String,

    /// Preferred display name (`preferred_username`, falling back to `sub`)
    pub display_name: String,

    /// Email claim, when present
    pub email: Option<String>,

    /// Realm roles
    pub roles: BTreeSet<String>,

    /// Group memberships
    pub groups: BTreeSet<String>,

    /// The full verified claim set
    pub raw_claims: Value,
}

impl Subject {
    /// Build a subject from a verified claim set
    pub fn from_claims(claims: Value) -> Self {
        let subject_id = claims
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let display_name = claims
            .get("preferred_username")
            .or_else(|| claims.get("username"))
            .and_then(Value::as_str)
            .unwrap_or(&subject_id)
            .to_string();

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string);

        let roles = claims
            .pointer("/realm_access/roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let groups = claims
            .get("groups")
            .and_then(Value::as_array)
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|g| g.trim_start_matches('/').to_string())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            subject_id,
            display_name,
            email,
            roles,
            groups,
            raw_claims: claims,
        }
    }

    /// The anonymous subject used when authentication is disabled
    pub fn anonymous() -> Self {
        Self {
            subject_id: "anonymous".to_string(),
            display_name: "anonymous".to_string(),
            email: None,
            roles: BTreeSet::new(),
            groups: BTreeSet::new(),
            raw_claims: Value::Null,
        }
    }

    /// Groups as a list, for the policy engine
    pub fn group_list(&self) -> Vec<String> {
        self.groups.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_keycloak_shaped_claims() {
        let subject = Subject::from_claims(json!({
            "sub": "f3b2",
            "preferred_username": "alice",
            "email": "alice@example.com",
            "realm_access": {"roles": ["operator", "auditor"]},
            "groups": ["/ops", "/search"]
        }));

        assert_eq!(subject.subject_id, "f3b2");
        assert_eq!(subject.display_name, "alice");
        assert_eq!(subject.email.as_deref(), Some("alice@example.com"));
        assert!(subject.roles.contains("operator"));
        assert_eq!(subject.group_list(), vec!["ops", "search"]);
    }

    #[test]
    fn sparse_claims_fall_back() {
        let subject = Subject::from_claims(json!({"sub": "svc-1"}));
        assert_eq!(subject.display_name, "svc-1");
        assert!(subject.roles.is_empty());
        assert!(subject.groups.is_empty());
    }

    #[test]
    fn anonymous_identity() {
        let subject = Subject::anonymous();
        assert_eq!(subject.subject_id, "anonymous");
        assert_eq!(subject.display_name, "anonymous");
    }
}
