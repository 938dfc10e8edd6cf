//! Command implementations
//!
//! `serve` runs the gateway in-process; everything else is a thin HTTP client
//! over the gateway's REST surface, so the CLI works against a remote
//! deployment exactly like a local one.

use crate::cli::OutputFormat;
use anyhow::{bail, Context, Result};
use gantry_config::{ConfigLoader, TransportKind, UpstreamConfig, UpstreamRegistry};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Run the gateway until interrupted
pub async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    let config = ConfigLoader::new()
        .load(config_path.as_deref())
        .context("failed to load configuration")?;

    let state = gantry_server::ServerContext::from_config(config).await?;
    gantry_server::serve(state).await
}

/// Register or update an upstream in the servers file
pub fn register_mcp(
    servers_file: &Path,
    name: &str,
    url: &str,
    transport: &str,
    timeout: u64,
    tags: Vec<String>,
    disabled: bool,
) -> Result<()> {
    let transport = match transport {
        "streamable_http" | "http" => TransportKind::StreamableHttp,
        "sse" => TransportKind::Sse,
        other => bail!("unknown transport type '{}', expected streamable_http or sse", other),
    };

    let registry = UpstreamRegistry::load(servers_file)?;
    registry.register(
        name,
        UpstreamConfig {
            url: url.to_string(),
            transport,
            timeout: Some(timeout),
            enabled: !disabled,
            description: None,
            tags: tags.into_iter().collect(),
            tools: Vec::new(),
            metadata: Default::default(),
            auth: None,
        },
    )?;

    println!("registered '{}' -> {}", name, url);
    Ok(())
}

/// Client over the gateway REST surface
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http: reqwest::Client::new(),
        }
    }

    fn decorate(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.decorate(self.http.get(&url)).send().await?;
        Self::into_json(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.decorate(self.http.post(&url)).json(body).send().await?;
        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            let detail = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            bail!("gateway returned {}: {}", status, detail);
        }
        Ok(body)
    }
}

/// `list-servers`
pub async fn list_servers(api: &ApiClient) -> Result<()> {
    let body = api.get("/mcp/servers").await?;
    let servers = body["servers"].as_array().cloned().unwrap_or_default();

    if servers.is_empty() {
        println!("no MCP servers configured");
        return Ok(());
    }

    for server in servers {
        let enabled = if server["enabled"].as_bool().unwrap_or(false) {
            "enabled"
        } else {
            "disabled"
        };
        println!(
            "{:<24} {:<10} {}",
            server["name"].as_str().unwrap_or("?"),
            enabled,
            server["url"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

/// `list-tools <server>`
pub async fn list_tools(api: &ApiClient, server: &str, format: OutputFormat) -> Result<()> {
    let body = api
        .get(&format!("/mcp/list-tools?mcp_server={}", server))
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&body)?),
        OutputFormat::Summary => {
            for tool in body["tools"].as_array().cloned().unwrap_or_default() {
                println!("{}", tool["name"].as_str().unwrap_or("?"));
            }
        }
        OutputFormat::Full => {
            for tool in body["tools"].as_array().cloned().unwrap_or_default() {
                println!(
                    "{:<32} {}",
                    tool["name"].as_str().unwrap_or("?"),
                    tool["description"].as_str().unwrap_or(""),
                );
            }
        }
    }
    Ok(())
}

/// `invoke <server> <tool>`
pub async fn invoke(
    api: &ApiClient,
    server: &str,
    tool: &str,
    params: Option<Value>,
) -> Result<()> {
    let body = api
        .post(
            &format!("/mcp/invoke?mcp_server={}", server),
            &json!({
                "tool_name": tool,
                "parameters": params,
            }),
        )
        .await?;

    if !body["success"].as_bool().unwrap_or(false) {
        println!("{}", serde_json::to_string_pretty(&body)?);
        bail!("tool invocation reported an error");
    }
    println!("{}", serde_json::to_string_pretty(&body["result"])?);
    Ok(())
}

/// `invoke-broadcast <tool>`
pub async fn invoke_broadcast(
    api: &ApiClient,
    tool: &str,
    servers: Vec<String>,
    tags: Vec<String>,
    params: Option<Value>,
    format: OutputFormat,
) -> Result<()> {
    let mut request = json!({ "tool_name": tool, "parameters": params });
    if !servers.is_empty() {
        request["mcp_servers"] = json!(servers);
    }
    if !tags.is_empty() {
        request["tags"] = json!(tags);
    }

    let body = api.post("/mcp/invoke-broadcast", &request).await?;
    render_broadcast(&body, format)?;

    // Partial failure is not a CLI failure; an entirely failed fan-out is.
    if body["successful"].as_u64().unwrap_or(0) == 0 {
        bail!("broadcast failed on every server");
    }
    Ok(())
}

fn render_broadcast(body: &Value, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(body)?),
        OutputFormat::Summary => {
            println!(
                "{}: {} servers, {} ok, {} failed, {}ms",
                body["tool_name"].as_str().unwrap_or("?"),
                body["total_servers"],
                body["successful"],
                body["failed"],
                body["execution_time_ms"],
            );
            if let Some(errors) = body["errors"].as_object() {
                for (server, error) in errors {
                    println!("  {} FAILED: {}", server, error.as_str().unwrap_or("?"));
                }
            }
        }
        OutputFormat::Full => {
            if let Some(results) = body["results"].as_object() {
                for (server, result) in results {
                    println!("[{}]", server);
                    println!("{}", serde_json::to_string_pretty(result)?);
                }
            }
            if let Some(errors) = body["errors"].as_object() {
                for (server, error) in errors {
                    println!("[{}] ERROR: {}", server, error.as_str().unwrap_or("?"));
                }
            }
        }
    }
    Ok(())
}

/// Read `-p` / `--params-file` into one JSON value
pub fn load_params(inline: Option<String>, file: Option<PathBuf>) -> Result<Option<Value>> {
    if let Some(inline) = inline {
        let value = serde_json::from_str(&inline).context("invalid JSON in --params")?;
        return Ok(Some(value));
    }
    if let Some(path) = file {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read params file {}", path.display()))?;
        let value = serde_json::from_str(&content).context("invalid JSON in params file")?;
        return Ok(Some(value));
    }
    Ok(None)
}
