//! Audit logger facade
//!
//! Combines the synchronous JSON-lines sink with the SQLite history. Audit
//! failures are logged and swallowed: a broken audit pipeline must not take
//! request handling down with it.

use crate::event::{AuditEvent, EventStatus, EventType};
use crate::sink::JsonLinesSink;
use crate::store::AuditStore;
use tracing::error;

/// Records audit events to every configured sink
pub struct AuditLogger {
    sink: Option<JsonLinesSink>,
    store: Option<AuditStore>,
}

impl AuditLogger {
    /// Create a logger over the given sinks
    pub fn new(sink: Option<JsonLinesSink>, store: Option<AuditStore>) -> Self {
        Self { sink, store }
    }

    /// A logger that drops everything (tests, `--no-audit` tooling)
    pub fn disabled() -> Self {
        Self {
            sink: None,
            store: None,
        }
    }

    /// Record one event to the line sink and the history store
    pub async fn record(&self, event: AuditEvent) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.write(&event) {
                error!(error = %e, "failed to write audit line");
            }
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.insert(&event).await {
                error!(error = %e, "failed to store audit event");
            }
        }
    }

    /// Record a policy denial
    pub async fn policy_violation(
        &self,
        subject: &str,
        action: &str,
        server: Option<&str>,
        tool: Option<&str>,
        reason: &str,
    ) {
        let mut event = AuditEvent::new(EventType::PolicyViolation, subject, action)
            .with_status(EventStatus::Denied)
            .with_policy_decision(reason);
        if let Some(server) = server {
            event = event.with_server(server);
        }
        if let Some(tool) = tool {
            event = event.with_tool(tool);
        }
        self.record(event).await;
    }

    /// Record an authentication attempt
    pub async fn authentication(&self, subject: Option<&str>, status: EventStatus, error: Option<&str>) {
        let mut event = AuditEvent::new(
            EventType::Authentication,
            subject.unwrap_or("anonymous"),
            "token_verify",
        )
        .with_status(status);
        if let Some(error) = error {
            event = event.with_error(error);
        }
        self.record(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_writes_line_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.json");
        let sink = JsonLinesSink::open(&path, false).unwrap();
        let store = AuditStore::connect("sqlite::memory:").await.unwrap();
        let logger = AuditLogger::new(Some(sink), Some(store));

        logger
            .policy_violation("alice", "invoke_tool", Some("alpha"), Some("admin_reset"), "denied by rule: lockdown")
            .await;

        let content = std::fs::read_to_string(&path).unwrap();
        let line: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(line["event_type"], "policy_violation");
        assert_eq!(line["status"], "denied");
        assert_eq!(line["policy_decision"], "denied by rule: lockdown");
    }

    #[tokio::test]
    async fn disabled_logger_is_a_no_op() {
        let logger = AuditLogger::disabled();
        logger.authentication(None, EventStatus::Error, Some("no token")).await;
    }
}
