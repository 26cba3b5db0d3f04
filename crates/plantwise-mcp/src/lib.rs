//! JSON-RPC 2.0 client for streamable-HTTP tool servers.
//!
//! A session is acquired with `initialize` (the server answers with an
//! `Mcp-Session-Id` header that every later request echoes), tools are
//! invoked with `tools/call`, and response bodies arrive either as plain
//! JSON or as an SSE stream terminated by the JSON-RPC result frame.

pub mod client;
pub mod jsonrpc;
pub mod session;
pub mod stream;

pub use client::McpToolClient;
pub use session::{McpSession, SESSION_HEADER};
