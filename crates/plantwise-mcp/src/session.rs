use futures::StreamExt;
use reqwest::{header, Client, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use plantwise_core::error::{PlantwiseError, Result};

use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::stream::FrameReader;

/// Header carrying the opaque session identifier issued on `initialize`.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

const PROTOCOL_VERSION: &str = "2025-03-26";

/// One JSON-RPC session against a streamable-HTTP tool server.
///
/// The session is an explicit resource: `initialize` acquires it and every
/// subsequent request echoes the identifier. Callers decide when to renew;
/// `call_tool` reports session loss as `ToolSession` without retrying.
pub struct McpSession {
    http: Client,
    endpoint: String,
    session_id: Option<String>,
    next_id: i64,
}

impl McpSession {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: format!("{}/mcp", base_url.trim_end_matches('/')),
            session_id: None,
            next_id: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.session_id.is_some()
    }

    /// Acquire a session: `initialize`, capture the session header, then
    /// announce readiness with `notifications/initialized`.
    pub async fn initialize(&mut self) -> Result<()> {
        self.session_id = None;
        let id = self.next_request_id();
        let request = JsonRpcRequest::call(
            id,
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "plantwise",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        );

        let response = self
            .post(&request)
            .await
            .map_err(|e| PlantwiseError::ToolProtocol(format!("initialize failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlantwiseError::ToolProtocol(format!(
                "initialize failed: HTTP {}",
                status
            )));
        }

        if let Some(sid) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            self.session_id = Some(sid.to_string());
        }

        let frame = self.read_response(response, id).await?;
        if let Some(err) = frame.error {
            return Err(PlantwiseError::ToolProtocol(format!(
                "initialize rejected: {} ({})",
                err.message, err.code
            )));
        }

        let note = JsonRpcRequest::notification("notifications/initialized");
        if let Err(e) = self.post(&note).await {
            warn!(error = %e, "initialized notification not accepted");
        }

        info!(endpoint = %self.endpoint, "Tool session initialized");
        Ok(())
    }

    /// Invoke a tool and read the response stream until the result frame.
    /// Returns the raw JSON-RPC result value.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value> {
        let id = self.next_request_id();
        let request = JsonRpcRequest::call(
            id,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        );

        let response = self
            .post(&request)
            .await
            .map_err(|e| PlantwiseError::ToolProtocol(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
            // Session expired server-side; the identifier is useless now.
            self.session_id = None;
            return Err(PlantwiseError::ToolSession(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(PlantwiseError::ToolProtocol(format!(
                "tools/call failed: HTTP {}",
                status
            )));
        }

        let frame = self.read_response(response, id).await?;
        if let Some(err) = frame.error {
            return Err(PlantwiseError::ToolExecution {
                tool: name.to_string(),
                message: format!("{} ({})", err.message, err.code),
            });
        }
        frame
            .result
            .ok_or_else(|| PlantwiseError::ToolProtocol("result frame missing result".into()))
    }

    /// Read a response body — plain JSON or an SSE stream — until the frame
    /// answering `id` arrives. Dropping the stream closes the connection.
    async fn read_response(&mut self, response: Response, id: i64) -> Result<JsonRpcResponse> {
        let is_sse = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("text/event-stream"))
            .unwrap_or(false);

        if !is_sse {
            let text = response
                .text()
                .await
                .map_err(|e| PlantwiseError::ToolProtocol(e.to_string()))?;
            return serde_json::from_str(&text)
                .map_err(|e| PlantwiseError::ToolProtocol(format!("malformed response: {}", e)));
        }

        let mut reader = FrameReader::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PlantwiseError::ToolProtocol(e.to_string()))?;
            let text = String::from_utf8_lossy(&chunk);
            for frame in reader.feed(&text) {
                if frame.answers(id) {
                    return Ok(frame);
                }
                debug!("Skipping frame for another request");
            }
        }

        Err(PlantwiseError::ToolProtocol(
            "stream ended before result frame".into(),
        ))
    }

    async fn post(
        &self,
        request: &JsonRpcRequest,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json, text/event-stream")
            .json(request);
        if let Some(sid) = &self.session_id {
            req = req.header(SESSION_HEADER, sid);
        }
        req.send().await
    }

    fn next_request_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}
