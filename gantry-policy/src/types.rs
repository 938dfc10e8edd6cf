//! Policy document model
//!
//! The policy file is YAML with five top-level sections: `roles`,
//! `user_roles`, `group_roles`, `rules`, and `default_policy`. Rules are
//! priority-ordered overrides evaluated before any role permission.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Verdict of a policy check, with the reason that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: String,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Effect a rule applies when its condition matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Deny,
}

/// Fallback when neither a rule nor a role permission decides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultPolicy {
    Allow,
    Deny,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::Deny
    }
}

/// One permission granted to a role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permission {
    /// Resource pattern: `*`, an exact `mcp:server:tool` string, or a regex
    #[serde(default = "wildcard")]
    pub resource: String,

    /// Actions this permission covers; `*` covers all
    #[serde(default)]
    pub actions: Vec<String>,
}

fn wildcard() -> String {
    "*".to_string()
}

/// Named role: a bundle of permissions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Condition a rule matches against; missing fields mean "any"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Exact subject match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Exact action match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Exact match on the resource's server segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server: Option<String>,

    /// Anchored regex match on the resource's tool segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name_pattern: Option<String>,
}

/// Priority-ordered policy override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "unnamed")]
    pub name: String,

    #[serde(default)]
    pub priority: i64,

    pub action: RuleAction,

    #[serde(default)]
    pub condition: RuleCondition,
}

fn unnamed() -> String {
    "unnamed rule".to_string()
}

/// The whole policy document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDocument {
    pub roles: HashMap<String, RoleConfig>,
    pub user_roles: HashMap<String, Vec<String>>,
    pub group_roles: HashMap<String, Vec<String>>,
    pub rules: Vec<Rule>,
    pub default_policy: DefaultPolicy,
}

/// Canonical policy resource identifier: `mcp:<server>:<tool>`
pub fn resource_id(server: &str, tool: &str) -> String {
    format!("mcp:{}:{}", server, tool)
}

/// Split a resource identifier into its (server, tool) segments
pub fn resource_segments(resource: &str) -> (Option<&str>, Option<&str>) {
    let mut parts = resource.splitn(3, ':');
    let _scheme = parts.next();
    (parts.next(), parts.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_identifier_shape() {
        assert_eq!(resource_id("alpha", "echo"), "mcp:alpha:echo");
        assert_eq!(resource_segments("mcp:alpha:echo"), (Some("alpha"), Some("echo")));
        assert_eq!(resource_segments("mcp:alpha"), (Some("alpha"), None));
        assert_eq!(resource_segments("alpha"), (None, None));
    }

    #[test]
    fn document_parses_from_yaml() {
        let yaml = r#"
roles:
  admin:
    permissions:
      - resource: "*"
        actions: ["*"]
  reader:
    permissions:
      - resource: "mcp:.*:list_.*"
        actions: [list_tools]
user_roles:
  alice: [admin]
group_roles:
  ops: [reader]
rules:
  - name: block admin tools
    priority: 100
    action: deny
    condition:
      tool_name_pattern: "^admin_.*"
default_policy: deny
"#;
        let doc: PolicyDocument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(doc.rules.len(), 1);
        assert_eq!(doc.rules[0].priority, 100);
        assert_eq!(doc.default_policy, DefaultPolicy::Deny);
        assert!(doc.roles.contains_key("admin"));
    }

    #[test]
    fn empty_document_defaults_to_deny() {
        let doc: PolicyDocument = serde_yaml::from_str("{}").unwrap();
        assert_eq!(doc.default_policy, DefaultPolicy::Deny);
        assert!(doc.rules.is_empty());
    }
}
