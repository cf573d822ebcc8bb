//! `service_status`: reports the long-lived services and their state.

use crate::context::InvocationContext;
use crate::protocol::ToolContent;
use crate::registry::{ToolEntry, ToolHandler};
use crate::schema::InputSchema;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use warden_core::ServiceView;

pub struct ServiceStatusTool;

pub fn entry() -> ToolEntry {
    ToolEntry::new(
        "service_status",
        "List registered services and their lifecycle state",
        InputSchema::new(),
        ServiceStatusTool,
    )
}

#[async_trait]
impl ToolHandler for ServiceStatusTool {
    async fn invoke(
        &self,
        _ctx: &InvocationContext,
        _arguments: Map<String, Value>,
        services: &ServiceView,
    ) -> anyhow::Result<Vec<ToolContent>> {
        let services: Vec<Value> = services
            .statuses()
            .into_iter()
            .map(|(name, status)| json!({ "name": name, "status": status }))
            .collect();
        Ok(vec![ToolContent::json(json!({ "services": services }))])
    }
}
