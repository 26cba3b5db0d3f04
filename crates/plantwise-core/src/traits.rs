use futures::future::BoxFuture;

use crate::error::Result;
use crate::types::{ChatRequest, Row};

/// LLM chat completion — one prompt in, one string reply out.
pub trait ChatClient: Send + Sync + 'static {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String>>;
}

/// Read-only Cypher execution against the graph store.
pub trait GraphStore: Send + Sync + 'static {
    /// Run a read query and return rows as column-alias -> value maps.
    fn run_read_query(
        &self,
        cypher: &str,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'_, Result<Vec<Row>>>;
}

/// Remote tool invocation (maintenance, time-series).
///
/// Implementations own session acquisition and renewal; callers see only
/// the tool result or a classified error.
pub trait ToolClient: Send + Sync + 'static {
    fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> BoxFuture<'_, Result<serde_json::Value>>;
}
