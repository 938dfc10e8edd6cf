//! End-to-end proxy tests against in-process mock upstreams

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use gantry_audit::AuditLogger;
use gantry_config::{
    AuthFormat, AuthLocation, AuthMethod, AuthSpec, ProxyConfig, TransportKind, UpstreamConfig,
    UpstreamRegistry,
};
use gantry_proxy::{McpProxy, ProxyError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// State shared with a mock upstream: last seen Authorization header and an
/// optional artificial delay.
#[derive(Clone, Default)]
struct MockState {
    seen_authorization: Arc<Mutex<Option<String>>>,
    delay: Option<Duration>,
}

async fn mock_mcp(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        *state.seen_authorization.lock().unwrap() = Some(auth.to_string());
    }
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let method = body.get("method").and_then(Value::as_str).unwrap_or("");

    let result = match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "mock-upstream", "version": "0.0.1"}
        }),
        "tools/list" => json!({
            "tools": [
                {"name": "echo", "description": "Echo text back", "inputSchema": {"type": "object"}}
            ]
        }),
        "tools/call" => {
            let text = body
                .pointer("/params/arguments/text")
                .and_then(Value::as_str)
                .unwrap_or("ok");
            json!({"content": [{"type": "text", "text": text}], "isError": false})
        }
        "notifications/initialized" => return Json(json!({})),
        other => {
            return Json(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": format!("Method not found: {}", other)}
            }))
        }
    };

    Json(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

async fn spawn_mock(state: MockState) -> String {
    let app = Router::new().route("/mcp", post(mock_mcp)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/mcp", addr)
}

fn upstream(url: &str, timeout: Option<u64>, auth: Option<AuthSpec>) -> UpstreamConfig {
    UpstreamConfig {
        url: url.to_string(),
        transport: TransportKind::StreamableHttp,
        timeout,
        enabled: true,
        description: None,
        tags: Default::default(),
        tools: vec!["echo".to_string()],
        metadata: Default::default(),
        auth,
    }
}

fn proxy_over(servers: BTreeMap<String, UpstreamConfig>) -> McpProxy {
    McpProxy::new(
        Arc::new(UpstreamRegistry::from_map(servers)),
        ProxyConfig::default(),
        Arc::new(AuditLogger::disabled()),
    )
}

#[tokio::test]
async fn list_and_call_through_one_session_each() {
    let url = spawn_mock(MockState::default()).await;
    let mut servers = BTreeMap::new();
    servers.insert("alpha".to_string(), upstream(&url, Some(5), None));
    let proxy = proxy_over(servers);

    let tools = proxy.list_tools("alpha", "tester").await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "echo");

    let result = proxy
        .call_tool("alpha", "echo", "tester", Some(json!({"text": "hello"})))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(
        serde_json::to_value(&result.content[0]).unwrap()["text"],
        "hello"
    );
}

#[tokio::test]
async fn bearer_credential_reaches_the_upstream() {
    let seen = Arc::new(Mutex::new(None));
    let url = spawn_mock(MockState {
        seen_authorization: seen.clone(),
        delay: None,
    })
    .await;

    let auth = AuthSpec {
        method: AuthMethod::Bearer,
        location: AuthLocation::Header,
        name: "Authorization".to_string(),
        format: AuthFormat::Prefix,
        prefix: Some("Bearer ".to_string()),
        template: None,
        credential_ref: Some("env://UPSTREAM_TOKEN".to_string()),
        credential_value: None,
    };

    let mut servers = BTreeMap::new();
    servers.insert("secured".to_string(), upstream(&url, Some(5), Some(auth)));
    let proxy = proxy_over(servers);

    // Process-wide env var: fine here, this test owns the name.
    std::env::set_var("UPSTREAM_TOKEN", "abc123");
    proxy.list_tools("secured", "tester").await.unwrap();

    assert_eq!(seen.lock().unwrap().as_deref(), Some("Bearer abc123"));
}

#[tokio::test]
async fn unknown_and_disabled_servers_are_rejected() {
    let mut servers = BTreeMap::new();
    let mut disabled = upstream("http://127.0.0.1:1/mcp", Some(1), None);
    disabled.enabled = false;
    servers.insert("off".to_string(), disabled);
    let proxy = proxy_over(servers);

    assert!(matches!(
        proxy.list_tools("ghost", "tester").await.unwrap_err(),
        ProxyError::NotConfigured { .. }
    ));
    assert!(matches!(
        proxy.list_tools("off", "tester").await.unwrap_err(),
        ProxyError::Disabled { .. }
    ));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let url = spawn_mock(MockState {
        seen_authorization: Arc::new(Mutex::new(None)),
        delay: Some(Duration::from_secs(5)),
    })
    .await;

    let mut servers = BTreeMap::new();
    servers.insert("slow".to_string(), upstream(&url, Some(1), None));
    let proxy = proxy_over(servers);

    let err = proxy.list_tools("slow", "tester").await.unwrap_err();
    assert!(matches!(err, ProxyError::Timeout { seconds: 1, .. }));
}

#[tokio::test]
async fn broadcast_is_best_effort() {
    let ok_url_a = spawn_mock(MockState::default()).await;
    let ok_url_b = spawn_mock(MockState::default()).await;
    let slow_url = spawn_mock(MockState {
        seen_authorization: Arc::new(Mutex::new(None)),
        delay: Some(Duration::from_secs(5)),
    })
    .await;

    let mut servers = BTreeMap::new();
    servers.insert("a".to_string(), upstream(&ok_url_a, Some(5), None));
    servers.insert("b".to_string(), upstream(&ok_url_b, Some(5), None));
    servers.insert("c".to_string(), upstream(&slow_url, Some(1), None));
    let proxy = proxy_over(servers);

    let broadcast = proxy
        .invoke_tool_broadcast("echo", "tester", Some(json!({"text": "ok"})), None, None)
        .await
        .unwrap();

    // Closure: every target lands in exactly one of results/errors.
    assert_eq!(broadcast.total_servers, 3);
    assert_eq!(broadcast.successful + broadcast.failed, 3);
    assert_eq!(broadcast.results.len(), 2);
    assert_eq!(broadcast.errors.len(), 1);
    assert_eq!(broadcast.results["a"], json!("ok"));
    assert_eq!(broadcast.results["b"], json!("ok"));
    assert!(broadcast.errors["c"].contains("timed out"));
}
