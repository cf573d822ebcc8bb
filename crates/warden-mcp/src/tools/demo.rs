//! `demo`: echoes its input with the caller's session and credential.

use crate::context::InvocationContext;
use crate::protocol::ToolContent;
use crate::registry::{ToolEntry, ToolHandler};
use crate::schema::{ArgType, InputSchema};
use async_trait::async_trait;
use serde_json::{Map, Value};
use warden_core::ServiceView;

/// Shown in place of a credential that cannot be resolved.
pub const UNAVAILABLE: &str = "N/A";

pub struct DemoTool;

pub fn entry() -> ToolEntry {
    ToolEntry::new(
        "demo",
        "Echo the input together with the caller's session id and credential",
        InputSchema::new().required("input", ArgType::String, "Text to echo back"),
        DemoTool,
    )
}

#[async_trait]
impl ToolHandler for DemoTool {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: Map<String, Value>,
        services: &ServiceView,
    ) -> anyhow::Result<Vec<ToolContent>> {
        let input = arguments
            .get("input")
            .and_then(Value::as_str)
            .unwrap_or_default();

        // An unresolvable credential degrades to a marker instead of failing the call.
        let credential = match services.credential_resolver() {
            Some(resolver) => match resolver.resolve_credential(&ctx.session_id).await {
                Ok(credential) => credential.expose().to_string(),
                Err(e) => {
                    tracing::debug!(session_id = %ctx.session_id, error = %e, "Credential unavailable");
                    UNAVAILABLE.to_string()
                }
            },
            None => UNAVAILABLE.to_string(),
        };

        Ok(vec![ToolContent::text(format!(
            "Session ID: {}. Credential: {}. Input: '{}'",
            ctx.session_id, credential, input
        ))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Notifier;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use warden_core::{Credential, CredentialResolver, ServiceRegistry, SessionError, SessionId};

    struct Stub;

    #[async_trait]
    impl CredentialResolver for Stub {
        async fn resolve_credential(&self, session_id: &SessionId) -> Result<Credential, SessionError> {
            if session_id.as_str() == "sess-abc" {
                Ok(Credential::new("key-123"))
            } else {
                Err(SessionError::NotFound {
                    session_id: session_id.clone(),
                })
            }
        }
    }

    async fn run(session: &str) -> String {
        let services = ServiceView::new(Arc::new(ServiceRegistry::new()))
            .with_credential_resolver(Arc::new(Stub));
        let ctx = InvocationContext::new(
            SessionId::new(session),
            json!(1),
            Notifier::disconnected(json!(1)),
        );
        let args = json!({"input": "hello"}).as_object().cloned().unwrap();
        match &DemoTool.invoke(&ctx, args, &services).await.unwrap()[0] {
            ToolContent::Text { text } => text.clone(),
            other => panic!("unexpected content: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_known_session() {
        let text = run("sess-abc").await;
        assert!(text.contains("hello"));
        assert!(text.contains("key-123"));
        assert!(text.contains("sess-abc"));
    }

    #[tokio::test]
    async fn test_unknown_session_degrades() {
        let text = run("sess-zzz").await;
        assert!(text.contains("hello"));
        assert!(text.contains("Credential: N/A"));
    }
}
