//! Wire transports for the MCP server.
//!
//! - [`http`]: streamable HTTP, one POST per JSON-RPC message, replies as
//!   JSON or as an SSE stream
//! - [`stdio`]: newline-delimited JSON over stdin/stdout, one client

pub mod http;
pub mod stdio;

pub use http::{HttpServer, create_router};

/// Header carrying the session identifier on every request after initialize.
pub const SESSION_HEADER: &str = "mcp-session-id";
