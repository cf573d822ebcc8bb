//! `notify`: sends one log notification ahead of its result.

use crate::context::InvocationContext;
use crate::protocol::{LogLevel, ToolContent};
use crate::registry::{ToolEntry, ToolHandler};
use crate::schema::{ArgType, InputSchema};
use async_trait::async_trait;
use serde_json::{Map, Value};
use warden_core::ServiceView;

pub const DEFAULT_MESSAGE: &str = "This is a single test notification sent via session.";
const LOGGER: &str = "notify";

pub struct NotifyTool;

pub fn entry() -> ToolEntry {
    ToolEntry::new(
        "notify",
        "Send one log notification on the request's stream, then return",
        InputSchema::new().optional("message", ArgType::String, "Notification text"),
        NotifyTool,
    )
}

#[async_trait]
impl ToolHandler for NotifyTool {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: Map<String, Value>,
        _services: &ServiceView,
    ) -> anyhow::Result<Vec<ToolContent>> {
        let message = arguments
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MESSAGE);

        let delivered = ctx.notifier.log(LogLevel::Info, LOGGER, message);
        tracing::debug!(request_id = %ctx.request_id, delivered, "Sent test notification");

        let text = if delivered {
            "Sent one notification via session."
        } else {
            "No notification stream attached; nothing sent."
        };
        Ok(vec![ToolContent::text(text)])
    }
}
