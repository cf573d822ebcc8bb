//! Stdio transport: newline-delimited JSON-RPC on stdin/stdout.
//!
//! The process serves exactly one client. Its credential comes from the
//! environment rather than from headers, and the session is minted by the
//! first `initialize`. Logs must go to stderr; stdout carries only protocol
//! messages.

use crate::context::Notifier;
use crate::error::{McpError, codes};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, ServerMessage};
use crate::server::McpServer;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use warden_auth::ConnectContext;
use warden_core::SessionId;
use warden_core::config::AuthConfig;

/// Environment variable holding the stdio client's credential.
pub const CREDENTIAL_ENV: &str = "WARDEN_CREDENTIAL";

pub struct StdioTransport {
    server: Arc<McpServer>,
    ctx: ConnectContext,
}

impl StdioTransport {
    /// `ctx` stands in for the connection request the chain evaluates.
    pub fn new(server: Arc<McpServer>, ctx: ConnectContext) -> Self {
        Self { server, ctx }
    }

    /// Connection context for a local client whose credential is in
    /// [`CREDENTIAL_ENV`]. It is presented as the configured query parameter.
    pub fn context_from_env(auth: &AuthConfig) -> ConnectContext {
        let ctx = ConnectContext::new().with_client_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
        match std::env::var(CREDENTIAL_ENV) {
            Ok(credential) => ctx.with_query(auth.query_param.clone(), credential),
            Err(_) => {
                tracing::warn!(var = CREDENTIAL_ENV, "No credential in environment");
                ctx
            }
        }
    }

    /// Serve stdin/stdout until stdin closes.
    pub async fn run(self) -> Result<(), McpError> {
        tracing::info!("MCP server running on stdio");
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one client over an arbitrary line stream.
    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut session: Option<SessionId> = None;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let request = match parse_line(line) {
                Ok(request) => request,
                Err(response) => {
                    write_message(&mut writer, &ServerMessage::Response(response)).await?;
                    continue;
                }
            };

            if let Some(response) = self.handle(request, &mut session, &mut writer).await? {
                write_message(&mut writer, &ServerMessage::Response(response)).await?;
            }
        }

        if let Some(session_id) = session {
            if let Err(e) = self.server.close_session(&session_id).await {
                tracing::warn!(error = %e, "Failed to close stdio session");
            }
        }
        tracing::info!("Stdin closed, stdio transport stopped");
        Ok(())
    }

    async fn handle<W>(
        &self,
        request: JsonRpcRequest,
        session: &mut Option<SessionId>,
        writer: &mut W,
    ) -> Result<Option<JsonRpcResponse>, McpError>
    where
        W: AsyncWrite + Unpin,
    {
        let id = request.id.clone();
        let notification = request.is_notification();

        let session_id = if request.method == "initialize" {
            // Re-initializing replaces the previous session.
            if let Some(previous) = session.take() {
                self.server.close_session(&previous).await?;
            }
            match self.server.connect(&self.ctx).await {
                Ok(session_id) => {
                    *session = Some(session_id.clone());
                    session_id
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stdio client failed to authenticate");
                    return Ok(Some(JsonRpcResponse::from_error(id, &e)));
                }
            }
        } else {
            let Some(session_id) = session.clone() else {
                if notification {
                    return Ok(None);
                }
                return Ok(Some(JsonRpcResponse::error(
                    id,
                    codes::INVALID_REQUEST,
                    "Server not initialized",
                )));
            };
            if let Err(e) = self.server.validate_session(&session_id).await {
                if notification {
                    return Ok(None);
                }
                return Ok(Some(JsonRpcResponse::from_error(id, &e)));
            }
            session_id
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(id.clone().unwrap_or(Value::Null), tx);
        let server = self.server.clone();
        let task = tokio::spawn(async move {
            server
                .handle_request(request, &session_id, notifier, BTreeMap::new())
                .await
        });

        while let Some(notification) = rx.recv().await {
            write_message(writer, &ServerMessage::Notification(notification)).await?;
        }

        match task.await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!(error = %e, "Request task failed");
                Ok(Some(JsonRpcResponse::error(id, codes::INTERNAL_ERROR, "Internal error")))
            }
        }
    }
}

fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {}", e))
    })?;
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::error(None, codes::INVALID_REQUEST, format!("Invalid request: {}", e))
    })
}

async fn write_message<W>(writer: &mut W, message: &ServerMessage) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::AuditLogger;
    use warden_core::WardenConfig;

    fn server() -> Arc<McpServer> {
        let config = WardenConfig {
            auth: AuthConfig {
                api_keys: vec!["key-123".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        Arc::new(McpServer::from_config_with_audit(&config, Arc::new(AuditLogger::disabled())).unwrap())
    }

    async fn exchange(ctx: ConnectContext, input: &str) -> (Vec<Value>, Arc<McpServer>) {
        let server = server();
        let mut output = Vec::new();
        StdioTransport::new(server.clone(), ctx)
            .serve(input.as_bytes(), &mut output)
            .await
            .unwrap();
        let messages = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (messages, server)
    }

    #[tokio::test]
    async fn test_session_lifecycle_over_stdio() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#, "\n",
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"notify","arguments":{}}}"#, "\n",
        );
        let ctx = ConnectContext::new().with_query("key", "key-123");
        let (messages, server) = exchange(ctx, input).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["id"], 1);
        assert!(messages[0]["result"]["serverInfo"].is_object());
        // The notification precedes the result it belongs to.
        assert_eq!(messages[1]["method"], "notifications/message");
        assert_eq!(messages[1]["params"]["relatedRequestId"], 2);
        assert_eq!(messages[2]["id"], 2);
        assert_eq!(messages[2]["result"]["isError"], false);

        // EOF ends the session.
        assert_eq!(server.sessions().live_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_requires_initialize_and_credential() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"initialize"}"#, "\n",
            "garbage\n",
        );
        let (messages, _) = exchange(ConnectContext::new(), input).await;

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["error"]["code"], codes::INVALID_REQUEST);
        assert_eq!(messages[1]["error"]["code"], codes::AUTHENTICATION_FAILED);
        assert_eq!(messages[2]["error"]["code"], codes::PARSE_ERROR);
    }
}
