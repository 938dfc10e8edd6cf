//! Policy evaluation
//!
//! Evaluation order: rules by descending priority (source order breaks ties),
//! then role permissions for the subject, then role permissions via groups,
//! then the default policy. The engine never fails a check; malformed regexes
//! simply do not match.

use crate::types::{
    resource_segments, Decision, DefaultPolicy, PolicyDocument, Rule, RuleAction, RuleCondition,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Result type for policy load/reload operations
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Errors raised when loading a policy document
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Policy I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Policy YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// The policy decision point
///
/// Holds the current document behind an atomically swapped snapshot so that a
/// decision is always made against one consistent document.
pub struct PolicyEngine {
    path: Option<PathBuf>,
    current: RwLock<Arc<PolicyDocument>>,
}

impl PolicyEngine {
    /// Load the engine from a YAML policy file; a missing file yields the
    /// empty document (default deny)
    pub fn load(path: impl AsRef<Path>) -> PolicyResult<Self> {
        let path = path.as_ref().to_path_buf();
        let document = Self::read_file(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(document)),
        })
    }

    /// Build an engine from an in-memory document
    pub fn from_document(document: PolicyDocument) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(document)),
        }
    }

    fn read_file(path: &Path) -> PolicyResult<PolicyDocument> {
        if !path.exists() {
            warn!(file = %path.display(), "policy file not found, default policy applies");
            return Ok(PolicyDocument::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Re-read the policy file and swap the snapshot
    pub fn reload(&self) -> PolicyResult<()> {
        if let Some(path) = &self.path {
            let document = Self::read_file(path)?;
            let mut guard = self.current.write().expect("policy lock poisoned");
            *guard = Arc::new(document);
        }
        Ok(())
    }

    /// Current document snapshot
    pub fn snapshot(&self) -> Arc<PolicyDocument> {
        self.current.read().expect("policy lock poisoned").clone()
    }

    /// Decide whether `subject` (with `groups`) may perform `action` on
    /// `resource` (`mcp:<server>:<tool>`)
    pub fn check_permission(
        &self,
        subject: &str,
        groups: &[String],
        resource: &str,
        action: &str,
    ) -> Decision {
        let doc = self.snapshot();

        if let Some(decision) = check_rules(&doc, subject, resource, action) {
            return decision;
        }

        if let Some(roles) = doc.user_roles.get(subject) {
            if roles_permit(&doc, roles, resource, action) {
                return Decision::allow("allowed by user permission");
            }
        }

        for group in groups {
            if let Some(roles) = doc.group_roles.get(group) {
                if roles_permit(&doc, roles, resource, action) {
                    return Decision::allow(format!("allowed by group permission: {}", group));
                }
            }
        }

        match doc.default_policy {
            DefaultPolicy::Allow => Decision::allow("allowed by default policy"),
            DefaultPolicy::Deny => Decision::deny("denied by default policy"),
        }
    }
}

/// First matching rule in priority order decides; ties keep source order
fn check_rules(doc: &PolicyDocument, subject: &str, resource: &str, action: &str) -> Option<Decision> {
    let mut ordered: Vec<&Rule> = doc.rules.iter().collect();
    ordered.sort_by_key(|r| std::cmp::Reverse(r.priority));

    for rule in ordered {
        if !condition_matches(&rule.condition, subject, resource, action) {
            continue;
        }
        debug!(rule = %rule.name, priority = rule.priority, "policy rule matched");
        return Some(match rule.action {
            RuleAction::Allow => Decision::allow(format!("allowed by rule: {}", rule.name)),
            RuleAction::Deny => Decision::deny(format!("denied by rule: {}", rule.name)),
        });
    }
    None
}

fn condition_matches(condition: &RuleCondition, subject: &str, resource: &str, action: &str) -> bool {
    if let Some(user) = &condition.user {
        if user != subject {
            return false;
        }
    }

    if let Some(expected) = &condition.action {
        if expected != action {
            return false;
        }
    }

    let (server, tool) = resource_segments(resource);

    if let Some(expected) = &condition.mcp_server {
        match server {
            Some(server) if server == expected => {}
            _ => return false,
        }
    }

    if let Some(pattern) = &condition.tool_name_pattern {
        let Some(tool) = tool else { return false };
        if !anchored_match(pattern, tool) {
            return false;
        }
    }

    true
}

fn roles_permit(doc: &PolicyDocument, roles: &[String], resource: &str, action: &str) -> bool {
    roles
        .iter()
        .filter_map(|role| doc.roles.get(role))
        .flat_map(|role| role.permissions.iter())
        .any(|perm| {
            resource_pattern_matches(&perm.resource, resource)
                && (perm.actions.iter().any(|a| a == action || a == "*"))
        })
}

fn resource_pattern_matches(pattern: &str, resource: &str) -> bool {
    pattern == "*" || pattern == resource || anchored_match(pattern, resource)
}

/// Regex match anchored at the start, mirroring `re.match` semantics
fn anchored_match(pattern: &str, value: &str) -> bool {
    match Regex::new(&format!("^(?:{})", pattern)) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            warn!(pattern, error = %e, "invalid policy regex, treating as non-match");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Permission, RoleConfig};

    fn engine_from_yaml(yaml: &str) -> PolicyEngine {
        PolicyEngine::from_document(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn deny_rule_beats_role_permission() {
        let engine = engine_from_yaml(
            r#"
roles:
  admin:
    permissions:
      - resource: "*"
        actions: ["*"]
user_roles:
  alice: [admin]
rules:
  - name: block admin tools
    priority: 100
    action: deny
    condition:
      tool_name_pattern: "^admin_.*"
default_policy: allow
"#,
        );

        let decision = engine.check_permission("alice", &[], "mcp:myserver:admin_reset", "invoke_tool");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "denied by rule: block admin tools");

        // Outside the pattern the role permission applies.
        let decision = engine.check_permission("alice", &[], "mcp:myserver:echo", "invoke_tool");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "allowed by user permission");
    }

    #[test]
    fn rule_priority_order_decides() {
        let engine = engine_from_yaml(
            r#"
rules:
  - name: low allow
    priority: 1
    action: allow
    condition:
      user: bob
  - name: high deny
    priority: 50
    action: deny
    condition:
      user: bob
default_policy: allow
"#,
        );

        let decision = engine.check_permission("bob", &[], "mcp:a:echo", "invoke_tool");
        assert_eq!(decision.reason, "denied by rule: high deny");
    }

    #[test]
    fn equal_priority_keeps_source_order() {
        let engine = engine_from_yaml(
            r#"
rules:
  - name: first
    priority: 10
    action: allow
  - name: second
    priority: 10
    action: deny
"#,
        );

        let decision = engine.check_permission("anyone", &[], "mcp:a:b", "invoke_tool");
        assert_eq!(decision.reason, "allowed by rule: first");
    }

    #[test]
    fn group_roles_apply_after_user_roles() {
        let engine = engine_from_yaml(
            r#"
roles:
  reader:
    permissions:
      - resource: "*"
        actions: [list_tools]
group_roles:
  ops: [reader]
default_policy: deny
"#,
        );

        let groups = vec!["ops".to_string()];
        let decision = engine.check_permission("carol", &groups, "mcp:a:echo", "list_tools");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "allowed by group permission: ops");

        let decision = engine.check_permission("carol", &groups, "mcp:a:echo", "invoke_tool");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "denied by default policy");
    }

    #[test]
    fn resource_patterns_match_exact_wildcard_and_regex() {
        let doc = PolicyDocument {
            roles: [(
                "r".to_string(),
                RoleConfig {
                    permissions: vec![Permission {
                        resource: "mcp:logs-.*:search".to_string(),
                        actions: vec!["invoke_tool".to_string()],
                    }],
                },
            )]
            .into_iter()
            .collect(),
            user_roles: [("dave".to_string(), vec!["r".to_string()])].into_iter().collect(),
            ..PolicyDocument::default()
        };
        let engine = PolicyEngine::from_document(doc);

        assert!(engine.check_permission("dave", &[], "mcp:logs-east:search", "invoke_tool").allowed);
        assert!(!engine.check_permission("dave", &[], "mcp:db:search", "invoke_tool").allowed);
    }

    #[test]
    fn unknown_subject_falls_through_to_default() {
        let engine = engine_from_yaml("default_policy: allow");
        let decision = engine.check_permission("nobody", &[], "mcp:a:b", "invoke_tool");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "allowed by default policy");
    }

    #[test]
    fn malformed_regex_is_a_non_match() {
        let engine = engine_from_yaml(
            r#"
rules:
  - name: broken
    priority: 5
    action: deny
    condition:
      tool_name_pattern: "(["
default_policy: allow
"#,
        );

        let decision = engine.check_permission("x", &[], "mcp:a:tool", "invoke_tool");
        assert!(decision.allowed);
    }

    #[test]
    fn determinism_within_a_snapshot() {
        let engine = engine_from_yaml(
            r#"
rules:
  - name: gate
    priority: 9
    action: deny
    condition:
      mcp_server: vault
default_policy: allow
"#,
        );

        let first = engine.check_permission("eve", &[], "mcp:vault:read", "invoke_tool");
        let second = engine.check_permission("eve", &[], "mcp:vault:read", "invoke_tool");
        assert_eq!(first, second);
    }

    #[test]
    fn reload_swaps_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, "default_policy: deny\n").unwrap();

        let engine = PolicyEngine::load(&path).unwrap();
        assert!(!engine.check_permission("a", &[], "mcp:s:t", "invoke_tool").allowed);

        std::fs::write(&path, "default_policy: allow\n").unwrap();
        engine.reload().unwrap();
        assert!(engine.check_permission("a", &[], "mcp:s:t", "invoke_tool").allowed);
    }
}
