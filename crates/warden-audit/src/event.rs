//! Audit event types.
//!
//! Every event names what happened, to which session, through which tool.
//! Credentials themselves are never recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // ===== Connection events =====
    /// A connection was accepted and a session minted.
    SessionCreated,
    /// A connection was rejected by the middleware chain.
    AuthenticationFailed,
    /// A session was explicitly invalidated.
    SessionInvalidated,

    // ===== Credential access =====
    /// A handler resolved the credential behind a session.
    CredentialResolved,
    /// A handler's credential lookup failed.
    CredentialUnavailable,

    // ===== Tool events =====
    /// A tool was dispatched.
    ToolCalled,
    /// A tool returned a result.
    ToolSucceeded,
    /// A tool raised, panicked or timed out.
    ToolFailed,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionCreated => write!(f, "SESSION_CREATED"),
            Self::AuthenticationFailed => write!(f, "AUTH_FAILED"),
            Self::SessionInvalidated => write!(f, "SESSION_INVALIDATED"),
            Self::CredentialResolved => write!(f, "CREDENTIAL_RESOLVED"),
            Self::CredentialUnavailable => write!(f, "CREDENTIAL_UNAVAILABLE"),
            Self::ToolCalled => write!(f, "TOOL_CALLED"),
            Self::ToolSucceeded => write!(f, "TOOL_SUCCEEDED"),
            Self::ToolFailed => write!(f, "TOOL_FAILED"),
        }
    }
}

/// An audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: Uuid,

    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,

    /// Event type.
    pub event_type: AuditEventType,

    /// Session the event belongs to, if one exists yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Tool name for dispatch events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// JSON-RPC request id, for correlation with the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Client IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,

    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Error or rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Additional metadata.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl AuditEvent {
    /// Create a new audit event of the given type.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            event_type,
            session_id: None,
            tool: None,
            request_id: None,
            client_ip: None,
            duration_ms: None,
            error: None,
            meta: serde_json::Value::Null,
        }
    }

    /// Create a builder for an audit event.
    pub fn builder(event_type: AuditEventType) -> AuditEventBuilder {
        AuditEventBuilder::new(event_type)
    }

    /// Format the event as a human-readable log line.
    ///
    /// Format: `[timestamp] EVENT_TYPE session=... tool=... [error=...]`
    pub fn to_log_line(&self) -> String {
        let mut line = format!(
            "[{}] {}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.event_type,
        );

        if let Some(ref session_id) = self.session_id {
            line.push_str(&format!(" session={}", session_id));
        }
        if let Some(ref tool) = self.tool {
            line.push_str(&format!(" tool={}", tool));
        }
        if let Some(ref request_id) = self.request_id {
            line.push_str(&format!(" request_id={}", request_id));
        }
        if let Some(ref ip) = self.client_ip {
            line.push_str(&format!(" client_ip={}", ip));
        }
        if let Some(duration) = self.duration_ms {
            line.push_str(&format!(" duration_ms={}", duration));
        }
        if let Some(ref error) = self.error {
            line.push_str(&format!(" error=\"{}\"", error.replace('"', "'")));
        }

        line
    }
}

/// Builder for creating audit events.
#[derive(Debug)]
pub struct AuditEventBuilder {
    event: AuditEvent,
}

impl AuditEventBuilder {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event: AuditEvent::new(event_type),
        }
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.event.session_id = Some(id.into());
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.event.tool = Some(tool.into());
        self
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.event.request_id = Some(id.into());
        self
    }

    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.event.client_ip = Some(ip.into());
        self
    }

    pub fn duration_ms(mut self, duration: u64) -> Self {
        self.event.duration_ms = Some(duration);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.event.meta = meta;
        self
    }

    /// Build the audit event.
    pub fn build(self) -> AuditEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::builder(AuditEventType::ToolSucceeded)
            .session_id("sess-abc")
            .tool("demo")
            .request_id("7")
            .duration_ms(15)
            .build();

        assert_eq!(event.event_type, AuditEventType::ToolSucceeded);
        assert_eq!(event.session_id.as_deref(), Some("sess-abc"));
        assert_eq!(event.tool.as_deref(), Some("demo"));
        assert_eq!(event.duration_ms, Some(15));
    }

    #[test]
    fn test_to_log_line() {
        let event = AuditEvent::builder(AuditEventType::AuthenticationFailed)
            .client_ip("10.0.0.1")
            .error("invalid \"key\"")
            .build();

        let line = event.to_log_line();
        assert!(line.contains("AUTH_FAILED"));
        assert!(line.contains("client_ip=10.0.0.1"));
        assert!(line.contains("error=\"invalid 'key'\""));
        assert!(!line.contains("session="));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let event = AuditEvent::new(AuditEventType::SessionInvalidated);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "session_invalidated");
        assert!(json.get("tool").is_none());
        assert!(json.get("meta").is_none());
    }
}
