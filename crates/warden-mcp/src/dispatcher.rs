//! Tool dispatch.
//!
//! Resolves a tool by name, validates its arguments, runs the handler in its
//! own task and turns every outcome into a [`CallToolResponse`]. Handler
//! errors, panics and timeouts become structured failures; only an unknown
//! tool or invalid arguments are returned as errors, and both are detected
//! before any handler code runs.

use crate::context::{InvocationContext, Notifier};
use crate::error::McpError;
use crate::protocol::CallToolResponse;
use crate::registry::ToolRegistry;
use crate::resolver::AuditedResolver;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use warden_audit::AuditLogger;
use warden_core::{ServiceView, SessionId};

/// One call to dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub tool: String,
    pub arguments: Value,
    pub session_id: SessionId,
    pub request_id: Value,
    pub metadata: BTreeMap<String, String>,
}

impl DispatchRequest {
    pub fn new(
        tool: impl Into<String>,
        arguments: Value,
        session_id: SessionId,
        request_id: Value,
    ) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            session_id,
            request_id,
            metadata: BTreeMap::new(),
        }
    }
}

/// Routes tool calls to registered handlers.
#[derive(Clone)]
pub struct Dispatcher {
    registry: ToolRegistry,
    services: ServiceView,
    audit: Arc<AuditLogger>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a dispatcher. A credential resolver in `services` is wrapped so
    /// handler lookups are audited.
    pub fn new(registry: ToolRegistry, services: ServiceView, audit: Arc<AuditLogger>) -> Self {
        let services = match services.credential_resolver().cloned() {
            Some(inner) => services
                .with_credential_resolver(Arc::new(AuditedResolver::new(inner, audit.clone()))),
            None => services,
        };
        Self {
            registry,
            services,
            audit,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn services(&self) -> &ServiceView {
        &self.services
    }

    /// Dispatch a call.
    ///
    /// `notifier` is closed before this returns, so no notification for the
    /// request can follow the result.
    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        notifier: Notifier,
    ) -> Result<CallToolResponse, McpError> {
        let outcome = self.run(request, &notifier).await;
        notifier.close();
        outcome
    }

    async fn run(
        &self,
        request: DispatchRequest,
        notifier: &Notifier,
    ) -> Result<CallToolResponse, McpError> {
        let DispatchRequest {
            tool,
            arguments,
            session_id,
            request_id,
            metadata,
        } = request;

        let entry = self.registry.lookup(&tool)?;
        let arguments = entry
            .input_schema
            .validate(&arguments)
            .map_err(|reason| McpError::InvalidArguments {
                tool: tool.clone(),
                reason,
            })?;

        let request_label = request_id.to_string();
        if let Err(e) = self
            .audit
            .log_tool_called(Some(session_id.as_str()), &tool, &request_label)
            .await
        {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
        tracing::info!(tool = %tool, session_id = %session_id, request_id = %request_label, "Dispatching tool");

        let ctx = InvocationContext::new(session_id.clone(), request_id, notifier.clone())
            .with_metadata(metadata);
        let services = self.services.clone();
        let started = Instant::now();

        // Own task per invocation: a panic surfaces as a JoinError here.
        let mut handle = tokio::spawn(async move {
            entry
                .handler
                .invoke(&ctx, arguments, &services)
                .await
        });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => Some(joined),
                // The task is left running so the handler finishes its own cleanup.
                Err(_) => None,
            },
            None => Some(handle.await),
        };
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (response, failure) = match joined {
            Some(Ok(Ok(content))) => (CallToolResponse::success(content), None),
            Some(Ok(Err(e))) => {
                tracing::error!(tool = %tool, request_id = %request_label, error = ?e, "Tool execution failed");
                (Self::generic_failure(&tool), Some(e.to_string()))
            }
            Some(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "handler panicked".to_string()
                } else {
                    format!("handler task failed: {join_error}")
                };
                tracing::error!(tool = %tool, request_id = %request_label, reason = %reason, "Tool execution failed");
                (Self::generic_failure(&tool), Some(reason))
            }
            None => {
                let err = McpError::Timeout {
                    tool: tool.clone(),
                    timeout_ms: self
                        .timeout
                        .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                        .unwrap_or_default(),
                };
                tracing::warn!(tool = %tool, request_id = %request_label, "Tool timed out");
                (CallToolResponse::failure(err.to_string()), Some(err.to_string()))
            }
        };

        if let Err(e) = self
            .audit
            .log_tool_finished(
                Some(session_id.as_str()),
                &tool,
                &request_label,
                elapsed_ms,
                failure.as_deref(),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to write audit event");
        }

        Ok(response)
    }

    fn generic_failure(tool: &str) -> CallToolResponse {
        CallToolResponse::failure(format!(
            "internal error executing tool '{tool}', check server logs"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LogLevel, ToolContent};
    use crate::registry::{ToolEntry, ToolHandler};
    use crate::schema::{ArgType, InputSchema};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::mpsc;
    use warden_audit::AuditEventType;
    use warden_core::ServiceRegistry;

    struct Failing;

    #[async_trait]
    impl ToolHandler for Failing {
        async fn invoke(
            &self,
            _ctx: &InvocationContext,
            _arguments: Map<String, Value>,
            _services: &ServiceView,
        ) -> anyhow::Result<Vec<ToolContent>> {
            anyhow::bail!("database password is hunter2")
        }
    }

    struct Panicking;

    #[async_trait]
    impl ToolHandler for Panicking {
        async fn invoke(
            &self,
            _ctx: &InvocationContext,
            _arguments: Map<String, Value>,
            _services: &ServiceView,
        ) -> anyhow::Result<Vec<ToolContent>> {
            panic!("handler bug")
        }
    }

    struct Slow {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ToolHandler for Slow {
        async fn invoke(
            &self,
            ctx: &InvocationContext,
            _arguments: Map<String, Value>,
            _services: &ServiceView,
        ) -> anyhow::Result<Vec<ToolContent>> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctx.notifier.log(LogLevel::Info, "slow", "late");
            self.finished.store(true, Ordering::SeqCst);
            Ok(vec![ToolContent::text("done")])
        }
    }

    struct Chatty;

    #[async_trait]
    impl ToolHandler for Chatty {
        async fn invoke(
            &self,
            ctx: &InvocationContext,
            arguments: Map<String, Value>,
            _services: &ServiceView,
        ) -> anyhow::Result<Vec<ToolContent>> {
            ctx.notifier.log(LogLevel::Info, "chatty", "working");
            Ok(vec![ToolContent::text(format!(
                "{}:{}",
                ctx.session_id,
                arguments["input"].as_str().unwrap_or_default()
            ))])
        }
    }

    fn dispatcher(registry: ToolRegistry) -> (Dispatcher, Arc<warden_audit::MemoryStorage>) {
        let (logger, storage) = AuditLogger::in_memory();
        let services = ServiceView::new(Arc::new(ServiceRegistry::new()));
        (Dispatcher::new(registry, services, Arc::new(logger)), storage)
    }

    fn request(tool: &str, arguments: Value) -> DispatchRequest {
        DispatchRequest::new(tool, arguments, SessionId::new("sess-abc"), json!(1))
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (d, storage) = dispatcher(ToolRegistry::new());
        let err = d
            .dispatch(request("missing", json!({})), Notifier::disconnected(json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound { .. }));
        assert!(storage.events().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_before_invocation() {
        let registry = ToolRegistry::new();
        registry
            .register(ToolEntry::new(
                "chatty",
                "Chatty",
                InputSchema::new().required("input", ArgType::String, "Input"),
                Chatty,
            ))
            .unwrap();
        let (d, _) = dispatcher(registry);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = d
            .dispatch(request("chatty", json!({"input": 1})), Notifier::new(json!(1), tx))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidArguments { .. }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_notifications_precede_result() {
        let registry = ToolRegistry::new();
        registry
            .register(ToolEntry::new(
                "chatty",
                "Chatty",
                InputSchema::new().required("input", ArgType::String, "Input"),
                Chatty,
            ))
            .unwrap();
        let (d, storage) = dispatcher(registry);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let response = d
            .dispatch(request("chatty", json!({"input": "hello"})), Notifier::new(json!(1), tx))
            .await
            .unwrap();
        assert!(!response.is_error);
        assert_eq!(response.text(), "sess-abc:hello");

        // Already queued, and the channel is closed once drained.
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());

        let kinds: Vec<_> = storage.events().iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![AuditEventType::ToolCalled, AuditEventType::ToolSucceeded]);
    }

    #[tokio::test]
    async fn test_errors_and_panics_become_generic_failures() {
        let registry = ToolRegistry::new();
        registry
            .register(ToolEntry::new("failing", "Fails", InputSchema::new(), Failing))
            .unwrap();
        registry
            .register(ToolEntry::new("panicking", "Panics", InputSchema::new(), Panicking))
            .unwrap();
        let (d, storage) = dispatcher(registry);

        for tool in ["failing", "panicking"] {
            let response = d
                .dispatch(request(tool, Value::Null), Notifier::disconnected(json!(1)))
                .await
                .unwrap();
            assert!(response.is_error);
            assert_eq!(
                response.text(),
                format!("internal error executing tool '{tool}', check server logs")
            );
            assert!(!response.text().contains("hunter2"));
        }

        let failures = storage
            .events()
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::ToolFailed)
            .count();
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_timeout_lets_handler_finish() {
        let finished = Arc::new(AtomicBool::new(false));
        let registry = ToolRegistry::new();
        registry
            .register(ToolEntry::new(
                "slow",
                "Slow",
                InputSchema::new(),
                Slow {
                    finished: finished.clone(),
                },
            ))
            .unwrap();
        let (d, _) = dispatcher(registry);
        let d = d.with_timeout(Some(Duration::from_millis(20)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let response = d
            .dispatch(request("slow", json!({})), Notifier::new(json!(1), tx))
            .await
            .unwrap();
        assert!(response.is_error);
        assert!(response.text().contains("timed out"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst));
        // The late notification was dropped.
        assert!(rx.recv().await.is_none());
    }
}
