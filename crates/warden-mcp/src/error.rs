//! Error types for the MCP crate.

use thiserror::Error;
use warden_core::SessionError;

/// JSON-RPC error codes used by the server.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const SESSION_INVALID: i32 = -32001;
    pub const AUTHENTICATION_FAILED: i32 = -32002;
}

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Unknown JSON-RPC method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Connection rejected or credential invalid.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Session unknown, invalidated or expired.
    #[error("session invalid: {0}")]
    SessionInvalid(SessionError),

    /// Tool not found.
    #[error("tool not found: {name}")]
    ToolNotFound { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A tool with this name is already registered.
    #[error("tool already registered: {name}")]
    RegistryConflict { name: String },

    /// Execution did not finish within the dispatch timeout.
    #[error("tool {tool} timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::ToolNotFound { .. } | Self::InvalidArguments { .. } => codes::INVALID_PARAMS,
            Self::SessionInvalid(_) => codes::SESSION_INVALID,
            Self::AuthenticationFailed(_) => codes::AUTHENTICATION_FAILED,
            _ => codes::INTERNAL_ERROR,
        }
    }

    /// Whether the error is recoverable by the client with the detail shown.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MethodNotFound(_)
                | Self::AuthenticationFailed(_)
                | Self::SessionInvalid(_)
                | Self::ToolNotFound { .. }
                | Self::InvalidArguments { .. }
        )
    }

    /// Message safe to show to clients. Internal faults are normalized and
    /// logged in full here.
    pub fn client_message(&self) -> String {
        if self.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "Internal error");
            "Internal error".to_string()
        }
    }
}

impl From<SessionError> for McpError {
    fn from(err: SessionError) -> Self {
        if err.is_invalid_session() {
            Self::SessionInvalid(err)
        } else {
            Self::Internal(anyhow::Error::new(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::SessionId;

    #[test]
    fn test_codes() {
        assert_eq!(McpError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(McpError::ToolNotFound { name: "x".into() }.code(), -32602);
        let invalid: McpError = SessionError::NotFound {
            session_id: SessionId::new("sess-zzz"),
        }
        .into();
        assert_eq!(invalid.code(), -32001);
    }

    #[test]
    fn test_outbound_serialization_failure_is_internal() {
        let err: McpError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.code(), codes::INTERNAL_ERROR);
        assert_eq!(err.client_message(), "Internal error");
    }

    #[test]
    fn test_internal_errors_are_normalized() {
        let err: McpError = SessionError::Store("disk on fire".into()).into();
        assert_eq!(err.code(), -32603);
        assert_eq!(err.client_message(), "Internal error");

        let err = McpError::InvalidArguments {
            tool: "demo".into(),
            reason: "missing required argument 'input'".into(),
        };
        assert!(err.client_message().contains("input"));
    }
}
