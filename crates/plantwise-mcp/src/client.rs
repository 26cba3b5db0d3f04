use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::warn;

use plantwise_core::error::{PlantwiseError, Result};
use plantwise_core::traits::ToolClient;

use crate::session::McpSession;

/// `ToolClient` backed by a lazily-acquired JSON-RPC session.
///
/// Session loss (HTTP 404/401 on a call) triggers exactly one
/// re-initialize + retry; a second failure surfaces to the caller as a
/// per-call error. Failure to acquire the initial session surfaces as
/// `ToolProtocol`, which callers treat as "server unavailable". The session
/// outlives individual workflows and is reused until the server expires it.
pub struct McpToolClient {
    session: Mutex<McpSession>,
}

impl McpToolClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            session: Mutex::new(McpSession::new(base_url)),
        }
    }
}

impl ToolClient for McpToolClient {
    fn call_tool(&self, name: &str, arguments: Value) -> BoxFuture<'_, Result<Value>> {
        let name = name.to_string();
        Box::pin(async move {
            let mut session = self.session.lock().await;

            if !session.is_initialized() {
                session.initialize().await?;
            }

            let result = match session.call_tool(&name, arguments.clone()).await {
                Err(PlantwiseError::ToolSession(reason)) => {
                    warn!(%reason, tool = %name, "Tool session lost, re-initializing once");
                    session.initialize().await.map_err(|e| {
                        PlantwiseError::ToolExecution {
                            tool: name.clone(),
                            message: format!("session renewal failed: {}", e),
                        }
                    })?;
                    session.call_tool(&name, arguments).await.map_err(|e| match e {
                        PlantwiseError::ToolSession(r) => PlantwiseError::ToolExecution {
                            tool: name.clone(),
                            message: format!("session lost again: {}", r),
                        },
                        other => other,
                    })?
                }
                other => other?,
            };

            unwrap_tool_payload(&name, result)
        })
    }
}

/// Extract the tool payload from an MCP `tools/call` result.
///
/// The result wraps content blocks; text blocks usually carry JSON. A bare
/// payload (no `content` array) passes through untouched, and non-JSON text
/// is wrapped so callers always receive a JSON value.
fn unwrap_tool_payload(tool: &str, result: Value) -> Result<Value> {
    let content = match result.get("content").and_then(Value::as_array) {
        Some(items) => items,
        None => return Ok(result),
    };

    let text: String = content
        .iter()
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    if result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Err(PlantwiseError::ToolExecution {
            tool: tool.to_string(),
            message: text,
        });
    }

    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(_) => Ok(json!({ "result": text })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_json_text_content() {
        let result = json!({
            "content": [{"type": "text", "text": "{\"work_orders\": [{\"nr\": \"WO-1\"}]}"}],
            "isError": false
        });
        let payload = unwrap_tool_payload("get_work_orders_by_sensor", result).unwrap();
        assert_eq!(payload["work_orders"][0]["nr"], "WO-1");
    }

    #[test]
    fn test_unwrap_plain_text_content() {
        let result = json!({
            "content": [{"type": "text", "text": "no records"}]
        });
        let payload = unwrap_tool_payload("get_work_orders_by_sensor", result).unwrap();
        assert_eq!(payload["result"], "no records");
    }

    #[test]
    fn test_unwrap_bare_payload() {
        let result = json!({"work_orders": []});
        let payload = unwrap_tool_payload("get_work_orders_by_sensor", result).unwrap();
        assert!(payload["work_orders"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_unwrap_error_flag() {
        let result = json!({
            "content": [{"type": "text", "text": "sensor not known"}],
            "isError": true
        });
        let err = unwrap_tool_payload("get_work_orders_by_sensor", result).unwrap_err();
        match err {
            PlantwiseError::ToolExecution { tool, message } => {
                assert_eq!(tool, "get_work_orders_by_sensor");
                assert_eq!(message, "sensor not known");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unwrap_multiple_text_blocks() {
        let result = json!({
            "content": [
                {"type": "text", "text": "[{\"nr\":"},
                {"type": "text", "text": "\"WO-2\"}]"}
            ]
        });
        // Joined with newlines the blocks are not valid JSON, so they wrap.
        let payload = unwrap_tool_payload("t", result).unwrap();
        assert!(payload.get("result").is_some());
    }
}
