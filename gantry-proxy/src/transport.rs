//! Upstream transports
//!
//! Two ways to carry a JSON-RPC exchange to an upstream MCP server:
//!
//! * **Streamable HTTP**: every message is an HTTP POST; the reply body is
//!   either a plain JSON object or a short SSE stream containing it.
//! * **SSE**: one long-lived GET stream delivers server messages; requests go
//!   to a POST endpoint the server announces in its first `endpoint` event.
//!
//! Both attach the upstream's resolved credentials to every request.

use crate::credentials::AppliedAuth;
use futures_util::StreamExt;
use gantry_protocol::{JsonRpcRequest, JsonRpcResponse};
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;
use tracing::{debug, warn};

/// Transport-level failures, mapped to proxy error kinds by the caller
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    /// Stream closed or connection dropped before a response arrived. The
    /// upstream process may have crashed or been restarted.
    #[error("connection broken: {0}")]
    Broken(String),

    #[error("upstream returned HTTP {status}")]
    Status { status: u16 },

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Merge the body-placed credential into a serialized request envelope
fn envelope_with_auth(request: &JsonRpcRequest, auth: &AppliedAuth) -> Value {
    let mut envelope = serde_json::to_value(request).expect("request serializes");
    if let (Some((key, value)), Some(map)) = (&auth.body, envelope.as_object_mut()) {
        map.insert(key.clone(), value.clone());
    }
    envelope
}

fn apply_request_auth(mut builder: reqwest::RequestBuilder, auth: &AppliedAuth) -> reqwest::RequestBuilder {
    for (name, value) in &auth.headers {
        builder = builder.header(name, value);
    }
    if !auth.query.is_empty() {
        builder = builder.query(&auth.query);
    }
    builder
}

/// Scan an SSE body for the first JSON-RPC response object
///
/// Data may span several `data:` lines; events are blank-line separated.
fn response_from_sse_body(body: &str) -> Option<JsonRpcResponse> {
    let mut data = String::new();
    let flush = |data: &mut String| -> Option<JsonRpcResponse> {
        if data.is_empty() {
            return None;
        }
        let parsed = serde_json::from_str::<JsonRpcResponse>(data).ok();
        data.clear();
        parsed.filter(|r| r.result.is_some() || r.error.is_some())
    };

    for line in body.lines() {
        if let Some(chunk) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(chunk.trim_start());
        } else if line.trim().is_empty() {
            if let Some(response) = flush(&mut data) {
                return Some(response);
            }
        }
    }
    flush(&mut data)
}

// === Streamable HTTP ===

/// One streamable-HTTP upstream session
pub struct StreamableHttpSession {
    client: reqwest::Client,
    url: String,
    auth: AppliedAuth,
    session_id: Option<String>,
}

impl StreamableHttpSession {
    /// Create a session; no traffic happens until the first request
    pub fn new(client: reqwest::Client, url: String, auth: AppliedAuth) -> Self {
        Self {
            client,
            url,
            auth,
            session_id: None,
        }
    }

    fn builder(&self) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", gantry_protocol::MCP_PROTOCOL_VERSION);
        if let Some(id) = &self.session_id {
            builder = builder.header("Mcp-Session-Id", id);
        }
        apply_request_auth(builder, &self.auth)
    }

    /// POST one request and parse the correlated response
    pub async fn request(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let envelope = envelope_with_auth(request, &self.auth);
        let response = self
            .builder()
            .json(&envelope)
            .send()
            .await
            .map_err(classify_reqwest)?;

        if let Some(id) = response
            .headers()
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(id.to_string());
        }

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let is_sse = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/event-stream"))
            .unwrap_or(false);

        let body = response.text().await.map_err(classify_reqwest)?;

        if is_sse {
            response_from_sse_body(&body)
                .ok_or_else(|| TransportError::Protocol("SSE reply carried no JSON-RPC response".to_string()))
        } else {
            serde_json::from_str(&body)
                .map_err(|e| TransportError::Protocol(format!("bad JSON-RPC reply: {}", e)))
        }
    }

    /// POST one notification; 202 Accepted and empty replies are fine
    pub async fn notify(&self, notification: &JsonRpcRequest) -> Result<(), TransportError> {
        let envelope = envelope_with_auth(notification, &self.auth);
        let response = self
            .builder()
            .json(&envelope)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 202 {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}

// === SSE ===

/// One parsed server-sent event
#[derive(Debug, Default)]
struct SseEvent {
    event: String,
    data: String,
}

/// Buffered reader turning a byte stream into SSE events
struct SseEventReader {
    stream: Pin<Box<dyn futures_util::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + Sync>>,
    buffer: String,
}

impl SseEventReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream()),
            buffer: String::new(),
        }
    }

    /// Next complete event, or `None` when the stream ends
    async fn next_event(&mut self) -> Result<Option<SseEvent>, TransportError> {
        loop {
            // A complete event is terminated by a blank line.
            if let Some(end) = self.buffer.find("\n\n") {
                let raw = self.buffer[..end].to_string();
                self.buffer.drain(..end + 2);

                let mut event = SseEvent::default();
                for line in raw.lines() {
                    if let Some(name) = line.strip_prefix("event:") {
                        event.event = name.trim().to_string();
                    } else if let Some(data) = line.strip_prefix("data:") {
                        if !event.data.is_empty() {
                            event.data.push('\n');
                        }
                        event.data.push_str(data.trim_start());
                    }
                }
                if event.data.is_empty() && event.event.is_empty() {
                    continue;
                }
                return Ok(Some(event));
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => match std::str::from_utf8(&chunk) {
                    Ok(text) => self.buffer.push_str(text),
                    Err(_) => return Err(TransportError::Protocol("non-UTF-8 SSE chunk".to_string())),
                },
                Some(Err(e)) => return Err(TransportError::Broken(e.to_string())),
                None => return Ok(None),
            }
        }
    }
}

/// One SSE upstream session
pub struct SseSession {
    client: reqwest::Client,
    post_url: String,
    auth: AppliedAuth,
    events: SseEventReader,
}

impl SseSession {
    /// Open the event stream and wait for the server's `endpoint` event
    pub async fn connect(
        client: reqwest::Client,
        url: String,
        auth: AppliedAuth,
    ) -> Result<Self, TransportError> {
        let builder = client
            .get(&url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");
        let response = apply_request_auth(builder, &auth)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::Connect(format!(
                "SSE endpoint returned {}",
                response.status()
            )));
        }

        let mut events = SseEventReader::new(response);

        // The first event names the POST endpoint for this session.
        let endpoint = loop {
            match events.next_event().await? {
                Some(event) if event.event == "endpoint" => break event.data,
                Some(other) => {
                    debug!(event = %other.event, "skipping pre-endpoint SSE event");
                }
                None => {
                    return Err(TransportError::Broken(
                        "SSE stream ended before the endpoint event".to_string(),
                    ))
                }
            }
        };

        let base = url::Url::parse(&url).map_err(|e| TransportError::Connect(e.to_string()))?;
        let post_url = base
            .join(&endpoint)
            .map_err(|e| TransportError::Protocol(format!("bad endpoint URL '{}': {}", endpoint, e)))?
            .to_string();

        Ok(Self {
            client,
            post_url,
            auth,
            events,
        })
    }

    /// POST a request, then read the stream until its response arrives
    pub async fn request(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        self.post(request).await?;

        loop {
            match self.events.next_event().await? {
                Some(event) => {
                    if event.data == "keep-alive" || event.data.is_empty() {
                        continue;
                    }
                    let Ok(response) = serde_json::from_str::<JsonRpcResponse>(&event.data) else {
                        debug!(event = %event.event, "skipping non-response SSE payload");
                        continue;
                    };
                    if response.id == request.id {
                        return Ok(response);
                    }
                    warn!(?response.id, "dropping SSE response for another request id");
                }
                None => {
                    return Err(TransportError::Broken(
                        "SSE stream ended while waiting for a response".to_string(),
                    ))
                }
            }
        }
    }

    /// POST a notification without waiting on the stream
    pub async fn notify(&mut self, notification: &JsonRpcRequest) -> Result<(), TransportError> {
        self.post(notification).await
    }

    async fn post(&self, message: &JsonRpcRequest) -> Result<(), TransportError> {
        let envelope = envelope_with_auth(message, &self.auth);
        let builder = self
            .client
            .post(&self.post_url)
            .header("Content-Type", "application/json");
        let response = apply_request_auth(builder, &self.auth)
            .json(&envelope)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if status.is_success() || status.as_u16() == 202 {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
            })
        }
    }
}

fn classify_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Broken(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sse_body_parsing_finds_the_response() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"result\":{\"ok\":true},\"id\":1}\n\n";
        let response = response_from_sse_body(body).unwrap();
        assert_eq!(response.result, Some(json!({"ok": true})));

        // Multi-line data chunks are joined before parsing.
        let body = "data: {\"jsonrpc\":\"2.0\",\ndata: \"result\":{},\"id\":2}\n\n";
        assert!(response_from_sse_body(body).is_some());

        assert!(response_from_sse_body("data: keep-alive\n\n").is_none());
    }

    #[test]
    fn body_auth_merges_into_envelope() {
        let auth = AppliedAuth {
            body: Some(("api_key".to_string(), json!("k1"))),
            ..AppliedAuth::default()
        };
        let request = JsonRpcRequest::with_id("tools/list", None, 1);
        let envelope = envelope_with_auth(&request, &auth);
        assert_eq!(envelope["api_key"], "k1");
        assert_eq!(envelope["method"], "tools/list");
    }
}
