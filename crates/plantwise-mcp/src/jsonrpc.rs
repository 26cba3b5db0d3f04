use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound JSON-RPC 2.0 envelope. Requests carry an id; notifications do not.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn call(id: i64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: Some(id),
            method: method.into(),
            params: Some(params),
        }
    }

    pub fn notification(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: None,
            method: method.into(),
            params: None,
        }
    }
}

/// Inbound JSON-RPC 2.0 envelope. Exactly one of `result`/`error` is set on
/// a response frame; other frames (requests, notifications from the server)
/// carry neither and are skipped by the reader.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// True when this frame answers the request with the given id.
    pub fn answers(&self, id: i64) -> bool {
        self.id == Some(id) && (self.result.is_some() || self.error.is_some())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let req = JsonRpcRequest::call(
            3,
            "tools/call",
            json!({"name": "get_work_orders_by_sensor", "arguments": {"sensor_name": "40-10-FI-001"}}),
        );
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["id"], 3);
        assert_eq!(wire["method"], "tools/call");
        assert_eq!(wire["params"]["name"], "get_work_orders_by_sensor");
    }

    #[test]
    fn test_notification_has_no_id() {
        let note = JsonRpcRequest::notification("notifications/initialized");
        let wire = serde_json::to_value(&note).unwrap();
        assert!(wire.get("id").is_none());
        assert!(wire.get("params").is_none());
    }

    #[test]
    fn test_response_answers() {
        let frame: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#).unwrap();
        assert!(frame.answers(3));
        assert!(!frame.answers(4));

        // A server-side notification answers nothing.
        let frame: JsonRpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#)
                .unwrap();
        assert!(!frame.answers(3));
    }

    #[test]
    fn test_error_frame() {
        let frame: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":5,"error":{"code":-32602,"message":"unknown sensor"}}"#,
        )
        .unwrap();
        assert!(frame.answers(5));
        let err = frame.error.unwrap();
        assert_eq!(err.code, -32602);
        assert_eq!(err.message, "unknown sensor");
    }
}
