//! Audit event model
//!
//! Events are a closed set. Serialized form is one JSON object per line with
//! UTC timestamps and every unset field omitted.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cap applied to free-form payload fields before serialization
pub const MAX_FIELD_LEN: usize = 4096;

/// Marker appended to truncated payloads
pub const TRUNCATION_MARKER: &str = "...[truncated]";

/// Closed set of audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    McpRequest,
    ToolInvocation,
    PolicyViolation,
    Authentication,
    ToolRegistration,
    ToolDeletion,
}

impl EventType {
    /// Wire name, matching the serde rename
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::McpRequest => "mcp_request",
            EventType::ToolInvocation => "tool_invocation",
            EventType::PolicyViolation => "policy_violation",
            EventType::Authentication => "authentication",
            EventType::ToolRegistration => "tool_registration",
            EventType::ToolDeletion => "tool_deletion",
        }
    }
}

/// Outcome recorded on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Success,
    Denied,
    Error,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Success => "success",
            EventStatus::Denied => "denied",
            EventStatus::Error => "error",
        }
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// UTC timestamp, ISO-8601 with trailing `Z`
    pub ts: String,

    pub event_type: EventType,

    /// Authenticated subject (or `anonymous`)
    pub subject: String,

    /// Operation performed (`list_tools`, `invoke_tool`, ...)
    pub action: String,

    /// Target upstream server, when one is involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Tool name, when one is involved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Request parameters, truncated to [`MAX_FIELD_LEN`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,

    pub status: EventStatus,

    /// Policy reason string, for policy-gated operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_decision: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// HTTP-ish status reported by the upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create an event stamped with the current time
    pub fn new(event_type: EventType, subject: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            ts: format_ts(Utc::now()),
            event_type,
            subject: subject.into(),
            action: action.into(),
            server: None,
            tool: None,
            parameters: None,
            status: EventStatus::Pending,
            policy_decision: None,
            duration_ms: None,
            upstream_status: None,
            error: None,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Attach parameters, truncating oversized payloads
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(truncate_value(parameters));
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_policy_decision(mut self, reason: impl Into<String>) -> Self {
        self.policy_decision = Some(reason.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(truncate_str(&error.into()));
        self
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Truncate a JSON payload whose serialized form exceeds the cap
pub fn truncate_value(value: Value) -> Value {
    let serialized = value.to_string();
    if serialized.len() <= MAX_FIELD_LEN {
        return value;
    }
    let cut = floor_char_boundary(&serialized, MAX_FIELD_LEN);
    Value::String(format!("{}{}", &serialized[..cut], TRUNCATION_MARKER))
}

fn truncate_str(value: &str) -> String {
    if value.len() <= MAX_FIELD_LEN {
        return value.to_string();
    }
    let cut = floor_char_boundary(value, MAX_FIELD_LEN);
    format!("{}{}", &value[..cut], TRUNCATION_MARKER)
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nil_fields_are_omitted() {
        let event = AuditEvent::new(EventType::McpRequest, "alice", "list_tools")
            .with_server("alpha")
            .with_status(EventStatus::Success);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "mcp_request");
        assert_eq!(value["server"], "alpha");
        assert!(value.get("tool").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn timestamp_is_utc_with_z() {
        let event = AuditEvent::new(EventType::Authentication, "bob", "token_verify");
        assert!(event.ts.ends_with('Z'), "got {}", event.ts);
    }

    #[test]
    fn oversized_parameters_truncated_with_marker() {
        let big = "x".repeat(MAX_FIELD_LEN * 2);
        let event = AuditEvent::new(EventType::ToolInvocation, "carol", "invoke_tool")
            .with_parameters(json!({ "blob": big }));

        let serialized = serde_json::to_string(&event.parameters).unwrap();
        assert!(serialized.len() < MAX_FIELD_LEN + 100);
        assert!(serialized.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn small_parameters_pass_through() {
        let params = json!({"q": "test"});
        let event = AuditEvent::new(EventType::ToolInvocation, "carol", "invoke_tool")
            .with_parameters(params.clone());
        assert_eq!(event.parameters, Some(params));
    }
}
