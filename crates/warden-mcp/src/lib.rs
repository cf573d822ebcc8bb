//! # warden-mcp
//!
//! MCP (Model Context Protocol) server for Warden.
//!
//! Clients authenticate once, when they connect, and get back a session id.
//! Every later message presents that id; tools never see the credential
//! unless they ask the session manager for it.
//!
//! ## Architecture
//!
//! ```text
//! MCP client
//!       │
//!       │ initialize (credential in query/header)
//!       ▼
//! ┌──────────────────────┐
//! │  Warden MCP Server   │
//! │  1. Middleware chain │  ← warden-auth
//! │  2. Mint session     │  ← warden-session
//! │  3. Validate session │
//! │  4. Look up tool     │  ← ToolRegistry
//! │  5. Validate args    │  ← InputSchema
//! │  6. Invoke handler   │  (isolated task, optional timeout)
//! │  7. Audit            │  ← warden-audit
//! └──────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use warden_core::WardenConfig;
//! use warden_mcp::{HttpServer, McpServer};
//!
//! let config = WardenConfig::from_file("warden.yaml")?;
//! let server = Arc::new(McpServer::from_config(&config)?);
//! server.start().await;
//! HttpServer::new(server.clone(), config.server.clone())
//!     .run(async { let _ = tokio::signal::ctrl_c().await; })
//!     .await?;
//! server.stop().await;
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod server;
pub mod tools;
pub mod transport;

// Re-export main types
pub use context::{InvocationContext, Notifier};
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use error::McpError;
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    LogLevel, ServerMessage, ToolContent, ToolDefinition,
};
pub use registry::{ToolEntry, ToolHandler, ToolRegistry};
pub use resolver::AuditedResolver;
pub use schema::{ArgType, InputSchema};
pub use server::McpServer;
pub use transport::SESSION_HEADER;
pub use transport::http::HttpServer;
pub use transport::stdio::StdioTransport;
