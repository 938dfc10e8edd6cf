//! The aggregator: one virtual MCP server over many upstreams
//!
//! Listing merges every enabled upstream's catalogue under namespaced names.
//! Calls are routed by prefix: `broadcast__by_tag__*` and `broadcast__*` fan
//! out, anything else splits on the first `__` into (server, tool). Upstream
//! failures surface as error content parts, never as protocol errors.

use crate::error::RpcFailure;
use crate::state::ServerContext;
use gantry_auth::Subject;
use gantry_config::SnapshotQueries;
use gantry_policy::resource_id;
use gantry_protocol::messages::{
    Prompt, PromptMessage, PromptsGetResult, Resource, ResourcesListResult, ResourcesReadResult,
    Tool, ToolsCallResult, ToolsListResult,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Separator between the upstream name and the upstream-local name
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Prefix of tool-name broadcast virtual tools
pub const BROADCAST_PREFIX: &str = "broadcast__";

/// Prefix of tag broadcast virtual tools
pub const TAG_BROADCAST_PREFIX: &str = "broadcast__by_tag__";

/// Aggregate tools from all enabled upstreams, plus synthesized broadcasts
pub async fn list_tools(ctx: &ServerContext, subject: &Subject) -> ToolsListResult {
    let enabled = ctx.proxy.snapshot().enabled();
    let mut tools = Vec::new();
    let mut providers_by_tool: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (server, _) in &enabled {
        let listed = match ctx.proxy.list_tools(server, &subject.display_name).await {
            Ok(listed) => listed,
            Err(e) => {
                // Per-upstream failures are non-fatal for listing.
                warn!(server = %server, error = %e, "skipping upstream during tools/list");
                continue;
            }
        };

        for tool in listed.tools {
            providers_by_tool
                .entry(tool.name.clone())
                .or_default()
                .push(server.clone());

            tools.push(Tool {
                name: format!("{}{}{}", server, NAMESPACE_SEPARATOR, tool.name),
                description: format!("[{}] {}", server, tool.description),
                input_schema: tool.input_schema,
            });
        }
    }

    let broadcast_tools = broadcast_tools(&providers_by_tool);
    let tag_tools = tag_broadcast_tools(&enabled);
    info!(
        total = tools.len() + broadcast_tools.len() + tag_tools.len(),
        broadcasts = broadcast_tools.len() + tag_tools.len(),
        "aggregated tools from enabled upstreams"
    );

    tools.extend(broadcast_tools);
    tools.extend(tag_tools);
    ToolsListResult { tools }
}

/// One `broadcast__{tool}` per tool with two or more providers
fn broadcast_tools(providers_by_tool: &BTreeMap<String, Vec<String>>) -> Vec<Tool> {
    providers_by_tool
        .iter()
        .filter(|(_, providers)| providers.len() > 1)
        .map(|(tool, providers)| Tool {
            name: format!("{}{}", BROADCAST_PREFIX, tool),
            description: format!(
                "[BROADCAST] Call '{}' across multiple servers: {}. Returns aggregated results from all {} servers.",
                tool,
                providers.join(", "),
                providers.len()
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "arguments": {
                        "type": "object",
                        "description": format!("Arguments to pass to '{}' on each server", tool),
                    },
                    "servers": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Optional: specific servers to query. If omitted, queries all providers.",
                        "default": providers,
                    }
                },
                "required": []
            }),
        })
        .collect()
}

/// One `broadcast__by_tag__{tag}` per tag shared by two or more upstreams
fn tag_broadcast_tools(enabled: &[(String, gantry_config::UpstreamConfig)]) -> Vec<Tool> {
    let mut tags: BTreeSet<&str> = BTreeSet::new();
    for (_, upstream) in enabled {
        tags.extend(upstream.tags.iter().map(String::as_str));
    }

    tags.into_iter()
        .filter_map(|tag| {
            let tagged: Vec<&str> = enabled
                .iter()
                .filter(|(_, u)| u.tags.contains(tag))
                .map(|(name, _)| name.as_str())
                .collect();
            if tagged.len() < 2 {
                return None;
            }
            Some(Tool {
                name: format!("{}{}", TAG_BROADCAST_PREFIX, tag),
                description: format!(
                    "[BROADCAST BY TAG] Execute a tool across all servers tagged with '{}': {}.",
                    tag,
                    tagged.join(", ")
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tool_name": {
                            "type": "string",
                            "description": "Name of the tool to execute on each tagged server",
                        },
                        "arguments": {
                            "type": "object",
                            "description": "Arguments to pass to the tool on each server",
                            "default": {},
                        }
                    },
                    "required": ["tool_name"]
                }),
            })
        })
        .collect()
}

/// Route a tool call by its virtual name
pub async fn call_tool(
    ctx: &ServerContext,
    subject: &Subject,
    name: &str,
    args: Value,
) -> Result<ToolsCallResult, RpcFailure> {
    if let Some(tag) = name.strip_prefix(TAG_BROADCAST_PREFIX) {
        return call_tag_broadcast(ctx, subject, tag, args).await;
    }
    if let Some(tool) = name.strip_prefix(BROADCAST_PREFIX) {
        return call_broadcast(ctx, subject, tool, args).await;
    }

    let Some((server, tool)) = name.split_once(NAMESPACE_SEPARATOR) else {
        // Malformed names answer with a textual error, not a protocol error.
        return Ok(ToolsCallResult::error_text(format!(
            "Error: Invalid tool name format. Expected 'server__tool' or 'broadcast__tool', got '{}'",
            name
        )));
    };

    authorize_invoke(ctx, subject, server, tool).await?;

    match ctx
        .proxy
        .call_tool(server, tool, &subject.display_name, Some(args))
        .await
    {
        Ok(result) => Ok(result),
        Err(e) => Ok(ToolsCallResult::error_text(format!(
            "Error: Failed to call tool {}: {}",
            name, e
        ))),
    }
}

async fn call_tag_broadcast(
    ctx: &ServerContext,
    subject: &Subject,
    tag: &str,
    args: Value,
) -> Result<ToolsCallResult, RpcFailure> {
    let Some(tool) = args.get("tool_name").and_then(Value::as_str).map(str::to_string) else {
        return Ok(ToolsCallResult::error_text(
            "Error: 'tool_name' is required for tag-based broadcast",
        ));
    };
    let arguments = args.get("arguments").cloned().unwrap_or_else(|| json!({}));

    debug!(tool = %tool, tag, "tag-based broadcast requested");
    authorize_invoke(ctx, subject, "*", &tool).await?;

    let tags = vec![tag.to_string()];
    let broadcast = ctx
        .proxy
        .invoke_tool_broadcast(&tool, &subject.display_name, Some(arguments), None, Some(&tags))
        .await
        .map_err(RpcFailure::from_proxy)?;

    Ok(broadcast_content(&broadcast))
}

async fn call_broadcast(
    ctx: &ServerContext,
    subject: &Subject,
    tool: &str,
    args: Value,
) -> Result<ToolsCallResult, RpcFailure> {
    let arguments = args.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let servers: Option<Vec<String>> = args
        .get("servers")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).map(str::to_string).collect());

    authorize_invoke(ctx, subject, "*", tool).await?;

    let broadcast = ctx
        .proxy
        .invoke_tool_broadcast(
            tool,
            &subject.display_name,
            Some(arguments),
            servers.as_deref(),
            None,
        )
        .await
        .map_err(RpcFailure::from_proxy)?;

    Ok(broadcast_content(&broadcast))
}

/// Serialise a broadcast outcome into one text content part
fn broadcast_content(broadcast: &gantry_proxy::BroadcastResult) -> ToolsCallResult {
    let block = json!({
        "tool": broadcast.tool_name,
        "total": broadcast.total_servers,
        "results": broadcast.results,
        "errors": broadcast.errors,
        "metadata": {
            "successful": broadcast.successful,
            "failed": broadcast.failed,
            "duration_ms": broadcast.execution_time_ms,
        }
    });
    ToolsCallResult::text(serde_json::to_string_pretty(&block).unwrap_or_else(|_| block.to_string()))
}

/// Policy gate for one tool invocation
async fn authorize_invoke(
    ctx: &ServerContext,
    subject: &Subject,
    server: &str,
    tool: &str,
) -> Result<(), RpcFailure> {
    let resource = resource_id(server, tool);
    let decision = ctx.policy.check_permission(
        &subject.display_name,
        &subject.group_list(),
        &resource,
        "invoke_tool",
    );

    if decision.allowed {
        debug!(resource = %resource, reason = %decision.reason, "policy allowed invocation");
        return Ok(());
    }

    ctx.audit
        .policy_violation(
            &subject.display_name,
            "invoke_tool",
            Some(server),
            Some(tool),
            &decision.reason,
        )
        .await;
    Err(RpcFailure::Forbidden(decision.reason))
}

/// Aggregate resources across enabled upstreams with `__` namespacing
pub async fn list_resources(ctx: &ServerContext, subject: &Subject) -> ResourcesListResult {
    let enabled = ctx.proxy.snapshot().enabled();
    let mut resources = Vec::new();

    for (server, _) in &enabled {
        match ctx.proxy.list_resources(server, &subject.display_name).await {
            Ok(listed) => {
                for resource in listed.resources {
                    resources.push(Resource {
                        uri: format!("{}{}{}", server, NAMESPACE_SEPARATOR, resource.uri),
                        name: format!("[{}] {}", server, resource.name),
                        description: resource.description,
                        mime_type: resource.mime_type,
                    });
                }
            }
            Err(e) => {
                warn!(server = %server, error = %e, "skipping upstream during resources/list");
            }
        }
    }

    ResourcesListResult { resources }
}

/// Read one namespaced resource
pub async fn read_resource(ctx: &ServerContext, subject: &Subject, uri: &str) -> ResourcesReadResult {
    let Some((server, upstream_uri)) = uri.split_once(NAMESPACE_SEPARATOR) else {
        return ResourcesReadResult {
            contents: vec![gantry_protocol::messages::ResourceContent {
                uri: uri.to_string(),
                text: Some(format!(
                    "Error: Invalid resource URI format. Expected 'server__uri', got '{}'",
                    uri
                )),
                blob: None,
                mime_type: None,
            }],
        };
    };

    match ctx
        .proxy
        .read_resource(server, upstream_uri, &subject.display_name)
        .await
    {
        Ok(result) => result,
        Err(e) => ResourcesReadResult {
            contents: vec![gantry_protocol::messages::ResourceContent {
                uri: uri.to_string(),
                text: Some(format!("Error: Failed to read resource {}: {}", uri, e)),
                blob: None,
                mime_type: None,
            }],
        },
    }
}

/// Aggregate prompts across enabled upstreams with `__` namespacing
pub async fn list_prompts(ctx: &ServerContext, subject: &Subject) -> gantry_protocol::messages::PromptsListResult {
    let enabled = ctx.proxy.snapshot().enabled();
    let mut prompts = Vec::new();

    for (server, _) in &enabled {
        match ctx.proxy.list_prompts(server, &subject.display_name).await {
            Ok(listed) => {
                for prompt in listed.prompts {
                    prompts.push(Prompt {
                        name: format!("{}{}{}", server, NAMESPACE_SEPARATOR, prompt.name),
                        description: prompt
                            .description
                            .map(|d| format!("[{}] {}", server, d))
                            .or_else(|| Some(format!("[{}]", server))),
                        arguments: prompt.arguments,
                    });
                }
            }
            Err(e) => {
                warn!(server = %server, error = %e, "skipping upstream during prompts/list");
            }
        }
    }

    gantry_protocol::messages::PromptsListResult { prompts }
}

/// Fetch one namespaced prompt, forwarding arguments verbatim
pub async fn get_prompt(
    ctx: &ServerContext,
    subject: &Subject,
    name: &str,
    arguments: Option<Value>,
) -> PromptsGetResult {
    let Some((server, prompt)) = name.split_once(NAMESPACE_SEPARATOR) else {
        return error_prompt(format!(
            "Error: Invalid prompt name format. Expected 'server__prompt', got '{}'",
            name
        ));
    };

    match ctx
        .proxy
        .get_prompt(server, prompt, &subject.display_name, arguments)
        .await
    {
        Ok(result) => result,
        Err(e) => error_prompt(format!("Error: Failed to get prompt {}: {}", name, e)),
    }
}

fn error_prompt(message: String) -> PromptsGetResult {
    PromptsGetResult {
        description: None,
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: json!({"type": "text", "text": message}),
        }],
    }
}
