//! # warden-audit
//!
//! Audit trail for the Warden MCP server.
//!
//! Records who connected, which sessions were created and invalidated,
//! every handler lookup of an original credential, and every tool call with
//! its outcome.
//!
//! | Event Type | Description |
//! |------------|-------------|
//! | `SessionCreated` | A connection passed the middleware chain |
//! | `AuthenticationFailed` | A connection was rejected |
//! | `SessionInvalidated` | A session was explicitly removed |
//! | `CredentialResolved` | A handler resolved a session's credential |
//! | `CredentialUnavailable` | A handler's credential lookup failed |
//! | `ToolCalled` | A tool was dispatched |
//! | `ToolSucceeded` | A tool returned a result |
//! | `ToolFailed` | A tool raised, panicked or timed out |
//!
//! File output is JSON Lines; console output is one JSON object per line on
//! stdout.
//!
//! ```rust,no_run
//! use warden_audit::AuditLogger;
//! use warden_core::config::AuditConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let logger = AuditLogger::new(AuditConfig::default())?;
//! logger.log_tool_called(Some("sess-abc"), "demo", "1").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::{AuditEvent, AuditEventBuilder, AuditEventType};
pub use logger::{AuditFilter, AuditLogger};
pub use storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, MemoryStorage, NullStorage};
