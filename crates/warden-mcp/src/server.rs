//! MCP server implementation.
//!
//! Ties the connection authenticator, the session manager and the dispatcher
//! together behind the JSON-RPC methods. Transports own the wire: they call
//! [`McpServer::connect`] for a new client, [`McpServer::validate_session`]
//! for every later message and then [`McpServer::handle_request`].

use crate::context::Notifier;
use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::error::{McpError, codes};
use crate::protocol::*;
use crate::registry::ToolRegistry;
use crate::tools::register_builtin;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_audit::AuditLogger;
use warden_auth::{ConnectContext, ConnectionAuthenticator, CredentialExtractor, chain_from_config};
use warden_core::{ServiceRegistry, ServiceView, SessionId, WardenConfig};
use warden_session::{SessionManager, SessionPolicy};

/// The MCP server.
pub struct McpServer {
    name: String,
    authenticator: Arc<ConnectionAuthenticator>,
    dispatcher: Dispatcher,
    services: Arc<ServiceRegistry>,
}

impl McpServer {
    /// Assemble a server from already built parts.
    pub fn new(
        name: impl Into<String>,
        authenticator: Arc<ConnectionAuthenticator>,
        dispatcher: Dispatcher,
        services: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            authenticator,
            dispatcher,
            services,
        }
    }

    /// Build the standard server: in-memory sessions, the configured
    /// middleware chain, and the built-in tools.
    pub fn from_config(config: &WardenConfig) -> Result<Self, McpError> {
        let audit = Arc::new(
            AuditLogger::new(config.audit.clone())
                .map_err(|e| McpError::StartupFailed(e.to_string()))?,
        );
        Self::from_config_with_audit(config, audit)
    }

    /// Like [`from_config`](Self::from_config) with a caller-provided audit logger.
    pub fn from_config_with_audit(
        config: &WardenConfig,
        audit: Arc<AuditLogger>,
    ) -> Result<Self, McpError> {
        let sessions = Arc::new(SessionManager::in_memory(SessionPolicy::from(&config.session)));

        let services = Arc::new(ServiceRegistry::new());
        services
            .register(sessions.clone())
            .map_err(|e| McpError::StartupFailed(e.to_string()))?;

        let chain = chain_from_config(&config.auth).map_err(|e| McpError::StartupFailed(e.to_string()))?;
        let authenticator = Arc::new(ConnectionAuthenticator::new(
            Arc::new(chain),
            CredentialExtractor::new(&config.auth),
            sessions.clone(),
            audit.clone(),
        ));

        let tools = ToolRegistry::new();
        register_builtin(&tools)?;

        let view = ServiceView::new(services.clone()).with_credential_resolver(sessions);
        let dispatcher = Dispatcher::new(tools, view, audit).with_timeout(config.dispatch.timeout());

        tracing::info!(
            tools = dispatcher.registry().len(),
            middleware = authenticator.chain().len(),
            "MCP server assembled"
        );
        Ok(Self::new(config.server.name.clone(), authenticator, dispatcher, services))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    pub fn authenticator(&self) -> &Arc<ConnectionAuthenticator> {
        &self.authenticator
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.authenticator.sessions()
    }

    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Start every registered service. Failures are logged, not fatal.
    pub async fn start(&self) {
        let failed = self.services.start_all().await;
        if !failed.is_empty() {
            tracing::warn!(failed = ?failed, "Some services failed to start");
        }
    }

    /// Stop every registered service in reverse order.
    pub async fn stop(&self) {
        let failed = self.services.stop_all().await;
        if !failed.is_empty() {
            tracing::warn!(failed = ?failed, "Some services failed to stop");
        }
    }

    /// Authenticate a new client and mint its session.
    pub async fn connect(&self, ctx: &ConnectContext) -> Result<SessionId, McpError> {
        self.authenticator.connect(ctx).await.map_err(|e| {
            if e.is_rejection() {
                McpError::AuthenticationFailed(e.to_string())
            } else {
                McpError::Internal(anyhow::Error::new(e))
            }
        })
    }

    /// Check that a session presented by a client is live.
    pub async fn validate_session(&self, session_id: &SessionId) -> Result<(), McpError> {
        self.sessions()
            .ensure_live(session_id)
            .await
            .map_err(McpError::from)
    }

    /// End a session. Unknown sessions are not an error.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<bool, McpError> {
        self.authenticator.disconnect(session_id).await.map_err(|e| McpError::Internal(e.into()))
    }

    /// Handle a JSON-RPC message from a client holding a validated session.
    ///
    /// Returns `None` for notifications.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        session_id: &SessionId,
        notifier: Notifier,
        metadata: BTreeMap<String, String>,
    ) -> Option<JsonRpcResponse> {
        let id = request.id.clone();

        if request.is_notification() {
            match request.method.as_str() {
                "notifications/initialized" | "initialized" => {
                    tracing::debug!(session_id = %session_id, "Client initialized");
                }
                "notifications/cancelled" => {
                    // In-flight work is not aborted; its response is simply discarded.
                    tracing::debug!(session_id = %session_id, "Client cancelled a request");
                }
                other => tracing::debug!(method = other, "Ignoring client notification"),
            }
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, initialize_result(&self.name)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id),
            "tools/call" => {
                self.handle_call_tool(id, request.params, session_id, notifier, metadata)
                    .await
            }
            "shutdown" => {
                tracing::info!(session_id = %session_id, "MCP server shutdown requested");
                JsonRpcResponse::success(id, Value::Null)
            }
            other => JsonRpcResponse::from_error(id, &McpError::MethodNotFound(other.to_string())),
        };
        Some(response)
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = ListToolsResponse {
            tools: self.tools().list(),
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::from_error(id, &McpError::from(e)),
        }
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        session_id: &SessionId,
        notifier: Notifier,
        metadata: BTreeMap<String, String>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, codes::INVALID_PARAMS, format!("Invalid params: {}", e));
                }
            },
            None => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing params"),
        };

        let mut request = DispatchRequest::new(
            params.name,
            params.arguments,
            session_id.clone(),
            id.clone().unwrap_or(Value::Null),
        );
        request.metadata = metadata;

        match self.dispatcher.dispatch(request, notifier).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::from_error(id, &McpError::from(e)),
            },
            Err(e) => {
                tracing::info!(error = %e, "Tool call rejected");
                JsonRpcResponse::from_error(id, &e)
            }
        }
    }
}
