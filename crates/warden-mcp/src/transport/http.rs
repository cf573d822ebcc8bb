//! HTTP transport for MCP server.
//!
//! Every JSON-RPC message is one POST to the configured path. A client
//! without a session may only send `initialize`; that request runs the
//! middleware chain and the reply carries the new session in the
//! `mcp-session-id` header. Later requests must present it.
//!
//! Requests are answered with a single JSON body, or with an SSE stream
//! (notifications first, then the result) when the client accepts
//! `text/event-stream` and JSON responses are not forced.

use super::SESSION_HEADER;
use crate::context::Notifier;
use crate::error::{McpError, codes};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, ServerMessage};
use crate::server::McpServer;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, DefaultBodyLimit, Query, State},
    http::{Extensions, HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::{get, post},
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use warden_auth::ConnectContext;
use warden_core::SessionId;
use warden_core::config::ServerConfig;

/// HTTP transport handler state.
pub struct HttpTransportState {
    server: Arc<McpServer>,
    json_response: bool,
}

impl HttpTransportState {
    fn wants_stream(&self, headers: &HeaderMap) -> bool {
        !self.json_response
            && headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|accept| accept.contains("text/event-stream"))
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(server: Arc<McpServer>, config: &ServerConfig) -> Router {
    let state = Arc::new(HttpTransportState {
        server,
        json_response: config.json_response,
    });

    Router::new()
        .route(&config.path, post(handle_mcp_post).delete(handle_mcp_delete))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle POST requests (one JSON-RPC message each).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
    uri: Uri,
    extensions: Extensions,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };
    let client_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let (session_id, minted) = match headers.get(SESSION_HEADER) {
        Some(raw) => {
            let Some(session_id) = raw.to_str().ok().and_then(SessionId::parse) else {
                return rpc_error(
                    StatusCode::BAD_REQUEST,
                    request.id,
                    codes::INVALID_REQUEST,
                    "Bad Request: Malformed session ID",
                );
            };
            if let Err(e) = state.server.validate_session(&session_id).await {
                tracing::debug!(session_id = %session_id, error = %e, "Rejected request for invalid session");
                return failure(request.id, &e);
            }
            (session_id, false)
        }
        None if request.method == "initialize" => {
            // Without an id there is no reply to carry the session header.
            if request.is_notification() {
                return rpc_error(
                    StatusCode::BAD_REQUEST,
                    None,
                    codes::INVALID_REQUEST,
                    "Bad Request: initialize must carry an id",
                );
            }
            let ctx = connect_context(&headers, &uri, client_ip);
            match state.server.connect(&ctx).await {
                Ok(session_id) => (session_id, true),
                Err(McpError::AuthenticationFailed(reason)) => {
                    tracing::info!(client_ip = ?client_ip, reason = %reason, "Connection rejected");
                    return rpc_error(
                        StatusCode::UNAUTHORIZED,
                        request.id,
                        codes::AUTHENTICATION_FAILED,
                        "Unauthorized: Invalid or missing credentials",
                    );
                }
                Err(e) => return failure(request.id, &e),
            }
        }
        None => {
            return rpc_error(
                StatusCode::BAD_REQUEST,
                request.id,
                codes::INVALID_REQUEST,
                "Bad Request: No valid session ID provided",
            );
        }
    };

    let metadata = request_metadata(&headers, client_ip);

    if request.is_notification() {
        state
            .server
            .handle_request(request, &session_id, Notifier::disconnected(Value::Null), metadata)
            .await;
        return StatusCode::ACCEPTED.into_response();
    }

    let mut response = if state.wants_stream(&headers) {
        stream_reply(state.server.clone(), request, session_id.clone(), metadata)
    } else {
        json_reply(&state.server, request, &session_id, metadata).await
    };

    if minted {
        if let Ok(value) = HeaderValue::from_str(session_id.as_str()) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}

/// Handle DELETE requests: the client ends its session.
async fn handle_mcp_delete(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(SessionId::parse)
    else {
        return rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            codes::INVALID_REQUEST,
            "Bad Request: No valid session ID provided",
        );
    };

    match state.server.close_session(&session_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => failure(None, &e),
    }
}

/// Handle health check requests.
async fn handle_health(State(state): State<Arc<HttpTransportState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": state.server.name(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn json_reply(
    server: &McpServer,
    request: JsonRpcRequest,
    session_id: &SessionId,
    metadata: BTreeMap<String, String>,
) -> Response {
    let notifier = Notifier::disconnected(request.id.clone().unwrap_or(Value::Null));
    match server.handle_request(request, session_id, notifier, metadata).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Run the request on its own task and stream what it emits.
///
/// The task is not tied to the stream: a client that goes away does not
/// cancel work already dispatched.
fn stream_reply(
    server: Arc<McpServer>,
    request: JsonRpcRequest,
    session_id: SessionId,
    metadata: BTreeMap<String, String>,
) -> Response {
    let id = request.id.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let notifier = Notifier::new(id.clone().unwrap_or(Value::Null), tx);

    let task = tokio::spawn(async move {
        server
            .handle_request(request, &session_id, notifier, metadata)
            .await
    });

    let stream = async_stream::stream! {
        while let Some(notification) = rx.recv().await {
            yield Ok::<_, Infallible>(sse_event(&ServerMessage::Notification(notification)));
        }
        let response = match task.await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "Request task failed");
                Some(JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "Internal error"))
            }
        };
        if let Some(response) = response {
            yield Ok(sse_event(&ServerMessage::Response(response)));
        }
    };

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
        .into_response()
}

fn sse_event(message: &ServerMessage) -> Event {
    let data = serde_json::to_string(message).unwrap_or_default();
    Event::default().event("message").data(data)
}

fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, Response> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            codes::PARSE_ERROR,
            format!("Parse error: {}", e),
        )
    })?;
    serde_json::from_value(value).map_err(|e| {
        rpc_error(
            StatusCode::BAD_REQUEST,
            None,
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", e),
        )
    })
}

fn connect_context(headers: &HeaderMap, uri: &Uri, client_ip: Option<std::net::IpAddr>) -> ConnectContext {
    let mut ctx = ConnectContext::new();
    if let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(uri) {
        for (name, value) in params {
            ctx = ctx.with_query(name, value);
        }
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    if let Some(ip) = client_ip {
        ctx = ctx.with_client_ip(ip);
    }
    ctx
}

fn request_metadata(headers: &HeaderMap, client_ip: Option<std::net::IpAddr>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(ip) = client_ip {
        metadata.insert("client_ip".to_string(), ip.to_string());
    }
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        metadata.insert("user_agent".to_string(), agent.to_string());
    }
    metadata
}

fn failure(id: Option<Value>, err: &McpError) -> Response {
    let status = match err {
        McpError::SessionInvalid(_) => StatusCode::NOT_FOUND,
        McpError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    rpc_error(status, id, err.code(), err.client_message())
}

fn rpc_error(status: StatusCode, id: Option<Value>, code: i32, message: impl Into<String>) -> Response {
    (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    server: Arc<McpServer>,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(server: Arc<McpServer>, config: ServerConfig) -> Self {
        Self { server, config }
    }

    /// Serve until `shutdown` resolves. In-flight requests are drained.
    pub async fn run<F>(self, shutdown: F) -> Result<(), McpError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr();
        let app = create_router(self.server, &self.config);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, path = %self.config.path, "MCP HTTP server listening");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        tracing::info!("MCP HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use warden_audit::AuditLogger;
    use warden_core::WardenConfig;

    fn app() -> Router {
        let config = WardenConfig::default();
        let server = McpServer::from_config_with_audit(&config, Arc::new(AuditLogger::disabled())).unwrap();
        create_router(Arc::new(server), &config.server)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "warden");
    }

    #[tokio::test]
    async fn test_parse_error() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let reply: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply["error"]["code"], codes::PARSE_ERROR);
    }

    #[test]
    fn test_metadata_and_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("agent/1.0"));
        headers.insert("X-API-Key", HeaderValue::from_static("k"));
        let uri: Uri = "/mcp?key=abc".parse().unwrap();
        let ip = "10.0.0.1".parse().ok();

        let ctx = connect_context(&headers, &uri, ip);
        assert_eq!(ctx.query("key"), Some("abc"));
        assert_eq!(ctx.header("x-api-key"), Some("k"));
        assert_eq!(ctx.client_ip, ip);

        let metadata = request_metadata(&headers, ip);
        assert_eq!(metadata["client_ip"], "10.0.0.1");
        assert_eq!(metadata["user_agent"], "agent/1.0");
    }
}
