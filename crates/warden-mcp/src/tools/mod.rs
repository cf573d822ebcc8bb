//! Built-in tools.

pub mod demo;
pub mod notify;
pub mod service_status;

use crate::error::McpError;
use crate::registry::{ToolEntry, ToolRegistry};

/// Every built-in tool.
pub fn builtin_tools() -> Vec<ToolEntry> {
    vec![demo::entry(), notify::entry(), service_status::entry()]
}

/// Register the built-in tools, failing on the first name already taken.
pub fn register_builtin(registry: &ToolRegistry) -> Result<(), McpError> {
    for entry in builtin_tools() {
        registry.register(entry)?;
    }
    Ok(())
}
