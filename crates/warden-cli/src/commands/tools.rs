//! `warden tools`: print the built-in tool definitions.

use anyhow::Result;
use clap::Args;
use warden_mcp::ToolRegistry;
use warden_mcp::tools::register_builtin;

/// Arguments for `warden tools`.
#[derive(Debug, Args)]
pub struct ToolsArgs {
    /// Print names only.
    #[arg(long, default_value_t = false)]
    pub names: bool,
}

pub fn run(args: ToolsArgs) -> Result<()> {
    let registry = ToolRegistry::new();
    register_builtin(&registry)?;

    if args.names {
        for name in registry.names() {
            println!("{}", name);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
    }
    Ok(())
}
