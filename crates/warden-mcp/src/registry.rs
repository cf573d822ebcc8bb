//! Tool registry for MCP tools.
//!
//! Tools can be registered and removed while the server runs. Lookups hand
//! out an `Arc` to the entry, so an invocation already dispatched keeps its
//! handler alive after the tool is unregistered or replaced.

use crate::context::InvocationContext;
use crate::error::McpError;
use crate::protocol::{ToolContent, ToolDefinition};
use crate::schema::InputSchema;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use warden_core::ServiceView;

/// The capability every tool implements.
///
/// `arguments` has already been validated against the tool's input schema.
/// An `Err` or a panic becomes a structured failure for the client; it never
/// reaches the transport.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: Map<String, Value>,
        services: &ServiceView,
    ) -> anyhow::Result<Vec<ToolContent>>;
}

/// A registered tool: declaration plus implementation.
pub struct ToolEntry {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: impl ToolHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler: Arc::new(handler),
        }
    }

    /// The definition advertised in `tools/list`.
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.input_schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of available MCP tools, shared by every dispatch.
///
/// Cloning is cheap and every clone sees the same tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<ToolEntry>>>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails if the name is taken; the existing tool stays.
    pub fn register(&self, entry: ToolEntry) -> Result<(), McpError> {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        if tools.contains_key(&entry.name) {
            return Err(McpError::RegistryConflict { name: entry.name });
        }
        tracing::debug!(tool = %entry.name, "Registered tool");
        tools.insert(entry.name.clone(), Arc::new(entry));
        Ok(())
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register_or_replace(&self, entry: ToolEntry) -> Option<Arc<ToolEntry>> {
        let name = entry.name.clone();
        let previous = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::new(entry));
        if previous.is_some() {
            tracing::info!(tool = %name, "Replaced tool");
        }
        previous
    }

    /// Unregister a tool by name. Unknown names are ignored.
    pub fn unregister(&self, name: &str) -> Option<Arc<ToolEntry>> {
        let removed = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            tracing::debug!(tool = %name, "Unregistered tool");
        }
        removed
    }

    /// Resolve a tool for dispatch.
    pub fn lookup(&self, name: &str) -> Result<Arc<ToolEntry>, McpError> {
        self.get(name).ok_or_else(|| McpError::ToolNotFound {
            name: name.to_string(),
        })
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<ToolEntry>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Definitions of every tool, sorted by name.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|e| e.definition())
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
