//! CLI command implementations for the Warden MCP server.

pub mod config;
pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use warden_core::WardenConfig;

/// Load a configuration file. A missing file yields the defaults.
///
/// Returns whether the file existed so the caller can log it once logging
/// is installed.
pub fn load_config(path: &Path) -> Result<(WardenConfig, bool)> {
    if !path.exists() {
        return Ok((WardenConfig::default(), false));
    }
    let config = WardenConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    Ok((config, true))
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
///
/// Logs always go to stderr: under the stdio transport stdout carries
/// protocol messages only.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
