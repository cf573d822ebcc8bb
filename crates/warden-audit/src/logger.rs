//! Audit logger implementation.
//!
//! Provides the main `AuditLogger` type with helper methods for the
//! connection, credential and tool events of the server.

use std::sync::Arc;
use warden_core::config::AuditConfig;

use crate::error::AuditError;
use crate::event::{AuditEvent, AuditEventType};
use crate::storage::{AuditStorage, ConsoleStorage, DualStorage, FileStorage, MemoryStorage, NullStorage};

/// The main audit logger.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
}

impl AuditLogger {
    /// Create a new audit logger with the given configuration.
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage: Arc<dyn AuditStorage> = match (&config.file, config.enabled, config.stdout) {
            (_, false, _) => Arc::new(NullStorage::new()),
            (Some(path), true, true) => Arc::new(DualStorage::new(path)?),
            (Some(path), true, false) => Arc::new(FileStorage::new(path)?),
            (None, true, true) => Arc::new(ConsoleStorage::new()),
            // Enabled without a sink: events still reach tracing.
            (None, true, false) => Arc::new(NullStorage::new()),
        };

        Ok(Self { config, storage })
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self { config, storage }
    }

    /// Create a disabled (no-op) logger.
    pub fn disabled() -> Self {
        Self {
            config: AuditConfig {
                enabled: false,
                ..Default::default()
            },
            storage: Arc::new(NullStorage::new()),
        }
    }

    /// Create an enabled logger backed by memory; returns the storage for inspection.
    pub fn in_memory() -> (Self, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let logger = Self::with_storage(AuditConfig::default(), storage.clone());
        (logger, storage)
    }

    /// Check if logging is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Log an audit event.
    pub async fn log(&self, event: AuditEvent) -> Result<(), AuditError> {
        if !self.config.enabled {
            return Ok(());
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            session_id = event.session_id.as_deref().unwrap_or("-"),
            tool = event.tool.as_deref().unwrap_or("-"),
            "Audit event"
        );

        self.storage.store(event).await
    }

    /// Log an event, reporting storage failures to tracing instead of the caller.
    pub async fn record(&self, event: AuditEvent) {
        let event_type = event.event_type;
        if let Err(e) = self.log(event).await {
            tracing::warn!(event_type = %event_type, error = %e, "Failed to write audit event");
        }
    }

    /// Log a newly minted session.
    pub async fn log_session_created(
        &self,
        session_id: &str,
        client_ip: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::SessionCreated).session_id(session_id);
        if let Some(ip) = client_ip {
            builder = builder.client_ip(ip);
        }
        self.log(builder.build()).await
    }

    /// Log a rejected connection attempt.
    pub async fn log_authentication_failed(
        &self,
        reason: &str,
        client_ip: Option<&str>,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::AuthenticationFailed).error(reason);
        if let Some(ip) = client_ip {
            builder = builder.client_ip(ip);
        }
        self.log(builder.build()).await
    }

    /// Log an explicit session invalidation.
    pub async fn log_session_invalidated(&self, session_id: &str) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::SessionInvalidated)
            .session_id(session_id)
            .build();
        self.log(event).await
    }

    /// Log a handler resolving the credential behind a session.
    pub async fn log_credential_resolved(&self, session_id: &str) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::CredentialResolved)
            .session_id(session_id)
            .build();
        self.log(event).await
    }

    /// Log a failed credential lookup.
    pub async fn log_credential_unavailable(
        &self,
        session_id: &str,
        error: &str,
    ) -> Result<(), AuditError> {
        let event = AuditEvent::builder(AuditEventType::CredentialUnavailable)
            .session_id(session_id)
            .error(error)
            .build();
        self.log(event).await
    }

    /// Log a tool dispatch.
    pub async fn log_tool_called(
        &self,
        session_id: Option<&str>,
        tool: &str,
        request_id: &str,
    ) -> Result<(), AuditError> {
        let mut builder = AuditEvent::builder(AuditEventType::ToolCalled)
            .tool(tool)
            .request_id(request_id);
        if let Some(id) = session_id {
            builder = builder.session_id(id);
        }
        self.log(builder.build()).await
    }

    /// Log a tool outcome. `error` is `None` on success.
    pub async fn log_tool_finished(
        &self,
        session_id: Option<&str>,
        tool: &str,
        request_id: &str,
        duration_ms: u64,
        error: Option<&str>,
    ) -> Result<(), AuditError> {
        let event_type = if error.is_some() {
            AuditEventType::ToolFailed
        } else {
            AuditEventType::ToolSucceeded
        };
        let mut builder = AuditEvent::builder(event_type)
            .tool(tool)
            .request_id(request_id)
            .duration_ms(duration_ms);
        if let Some(id) = session_id {
            builder = builder.session_id(id);
        }
        if let Some(error) = error {
            builder = builder.error(error);
        }
        self.log(builder.build()).await
    }

    /// Query audit events with filters.
    pub async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEvent>, AuditError> {
        self.storage.query(filter).await
    }

    /// Get an audit event by ID.
    pub async fn get(&self, event_id: uuid::Uuid) -> Result<Option<AuditEvent>, AuditError> {
        self.storage.get(event_id).await
    }

    /// Recent events for one session.
    pub async fn recent_for_session(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(AuditFilter {
            session_id: Some(session_id.to_string()),
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }
}

/// Filter for querying audit events.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Filter by session ID.
    pub session_id: Option<String>,
    /// Filter by tool name.
    pub tool: Option<String>,
    /// Filter by event type.
    pub event_type: Option<AuditEventType>,
    /// Filter by start time.
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Filter by end time.
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl AuditFilter {
    /// Whether an event passes every set criterion. Limit and offset are ignored.
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref session_id) = self.session_id {
            if event.session_id.as_ref() != Some(session_id) {
                return false;
            }
        }
        if let Some(ref tool) = self.tool {
            if event.tool.as_ref() != Some(tool) {
                return false;
            }
        }
        if let Some(event_type) = self.event_type {
            if event.event_type != event_type {
                return false;
            }
        }
        if let Some(start) = self.start_time {
            if event.occurred_at < start {
                return false;
            }
        }
        if let Some(end) = self.end_time {
            if event.occurred_at > end {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_logger() {
        let logger = AuditLogger::disabled();
        assert!(!logger.is_enabled());

        logger.log_tool_called(None, "demo", "1").await.unwrap();
        assert!(logger.query(AuditFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_lifecycle_events() {
        let (logger, storage) = AuditLogger::in_memory();

        logger
            .log_tool_called(Some("sess-a"), "demo", "1")
            .await
            .unwrap();
        logger
            .log_tool_finished(Some("sess-a"), "demo", "1", 3, None)
            .await
            .unwrap();
        logger
            .log_tool_finished(Some("sess-a"), "notify", "2", 5, Some("boom"))
            .await
            .unwrap();

        let kinds: Vec<_> = storage.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventType::ToolCalled,
                AuditEventType::ToolSucceeded,
                AuditEventType::ToolFailed
            ]
        );

        let failed = logger
            .query(AuditFilter {
                tool: Some("notify".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_recent_for_session() {
        let (logger, _) = AuditLogger::in_memory();
        logger.log_session_created("sess-a", Some("127.0.0.1")).await.unwrap();
        logger.log_credential_resolved("sess-a").await.unwrap();
        logger.log_session_created("sess-b", None).await.unwrap();
        logger.log_session_invalidated("sess-a").await.unwrap();

        let events = logger.recent_for_session("sess-a", 10).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].client_ip.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_file_logger_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::new(AuditConfig {
            enabled: true,
            stdout: false,
            file: Some(path.clone()),
        })
        .unwrap();

        logger
            .log_authentication_failed("missing credential", Some("10.0.0.9"))
            .await
            .unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("authentication_failed"));
        assert!(contents.contains("10.0.0.9"));
    }
}
