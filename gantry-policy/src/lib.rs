//! Policy decision point for the Gantry gateway
//!
//! Maps `(subject, groups, resource, action)` to an allow/deny verdict with a
//! human-readable reason. Driven by a YAML document of roles, role bindings,
//! and priority-ordered override rules.

pub mod engine;
pub mod types;

pub use engine::{PolicyEngine, PolicyError, PolicyResult};
pub use types::{
    resource_id, resource_segments, Decision, DefaultPolicy, Permission, PolicyDocument,
    RoleConfig, Rule, RuleAction, RuleCondition,
};
