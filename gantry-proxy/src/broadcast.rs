//! Broadcast fan-out
//!
//! One logical tool call dispatched to many upstreams concurrently. Each
//! child call runs under its own upstream timeout; one child failing or being
//! slow never cancels its siblings. The broadcast as a whole only fails when
//! the target set is empty.

use crate::error::{ProxyError, ProxyResult};
use crate::proxy::{describe_failure, McpProxy};
use gantry_audit::{AuditEvent, EventStatus, EventType};
use gantry_config::SnapshotQueries;
use gantry_protocol::messages::ToolContent;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

/// Aggregated outcome of one broadcast
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResult {
    /// Tool that was fanned out
    pub tool_name: String,

    /// Size of the target set
    pub total_servers: usize,

    /// Count of successful children
    pub successful: usize,

    /// Count of failed children
    pub failed: usize,

    /// Per-server payloads
    pub results: BTreeMap<String, Value>,

    /// Per-server error messages
    pub errors: BTreeMap<String, String>,

    /// Wall clock for the whole fan-out
    pub execution_time_ms: u64,
}

impl McpProxy {
    /// Select broadcast targets: explicit list, tags, tool providers, or all
    /// enabled upstreams, in that order of preference
    pub fn broadcast_targets(
        &self,
        tool: &str,
        servers: Option<&[String]>,
        tags: Option<&[String]>,
    ) -> Vec<String> {
        let snapshot = self.snapshot();

        if let Some(servers) = servers {
            // Explicit lists are honoured verbatim, still skipping disabled
            // entries so a stale caller list cannot re-enable a server.
            return servers
                .iter()
                .filter(|name| snapshot.get(*name).map(|u| u.enabled).unwrap_or(false))
                .cloned()
                .collect();
        }

        if let Some(tags) = tags {
            return snapshot.with_tags(tags);
        }

        let providers = snapshot.with_tool(tool);
        if !providers.is_empty() {
            return providers;
        }

        snapshot.enabled().into_iter().map(|(name, _)| name).collect()
    }

    /// Invoke `tool` on every target concurrently and gather the outcomes
    pub async fn invoke_tool_broadcast(
        &self,
        tool: &str,
        subject: &str,
        arguments: Option<Value>,
        servers: Option<&[String]>,
        tags: Option<&[String]>,
    ) -> ProxyResult<BroadcastResult> {
        let targets = self.broadcast_targets(tool, servers, tags);
        if targets.is_empty() {
            return Err(ProxyError::NoTargets);
        }

        info!(tool, targets = targets.len(), "broadcasting tool call");
        let started = Instant::now();

        let calls = targets.iter().map(|server| {
            let arguments = arguments.clone();
            async move {
                let outcome = self.call_tool(server, tool, subject, arguments).await;
                (server.clone(), outcome)
            }
        });

        let mut results = BTreeMap::new();
        let mut errors = BTreeMap::new();
        for (server, outcome) in futures_util::future::join_all(calls).await {
            match outcome {
                Ok(result) => {
                    results.insert(server, call_result_payload(result.content));
                }
                Err(e) => {
                    describe_failure(&server, &e);
                    errors.insert(server, e.to_string());
                }
            }
        }

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let broadcast = BroadcastResult {
            tool_name: tool.to_string(),
            total_servers: targets.len(),
            successful: results.len(),
            failed: errors.len(),
            results,
            errors,
            execution_time_ms,
        };

        self.audit_broadcast(subject, &broadcast, &targets).await;
        Ok(broadcast)
    }

    async fn audit_broadcast(&self, subject: &str, broadcast: &BroadcastResult, targets: &[String]) {
        let event = AuditEvent::new(EventType::McpRequest, subject, "invoke_tool_broadcast")
            .with_tool(&broadcast.tool_name)
            .with_parameters(json!({
                "target_servers": targets,
                "successful_servers": broadcast.results.keys().collect::<Vec<_>>(),
                "failed_servers": broadcast.errors.keys().collect::<Vec<_>>(),
            }))
            .with_duration_ms(broadcast.execution_time_ms)
            .with_status(if broadcast.successful > 0 {
                EventStatus::Success
            } else {
                EventStatus::Error
            });
        self.audit_logger().record(event).await;
    }
}

/// Collapse a child's content parts into one JSON payload
///
/// Single text parts that contain JSON are inlined so broadcast results stay
/// machine-readable; anything else is kept as the raw content list.
fn call_result_payload(content: Vec<ToolContent>) -> Value {
    if content.len() == 1 {
        if let ToolContent::Text { text } = &content[0] {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                return parsed;
            }
            return Value::String(text.clone());
        }
    }
    serde_json::to_value(content).unwrap_or(Value::Null)
}
