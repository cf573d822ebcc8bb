//! `warden serve`: run the MCP server until Ctrl-C (or stdin EOF under stdio).

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use warden_core::WardenConfig;
use warden_core::config::Transport;
use warden_mcp::{HttpServer, McpServer, StdioTransport};

/// Arguments for `warden serve`.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Configuration file path. Defaults apply when it does not exist.
    #[arg(short, long, env = "WARDEN_CONFIG", default_value = "warden.yaml")]
    pub config: PathBuf,

    /// Bind host. Overrides config file.
    #[arg(long, env = "WARDEN_HOST")]
    pub host: Option<String>,

    /// Bind port. Overrides config file.
    #[arg(long, env = "WARDEN_PORT")]
    pub port: Option<u16>,

    /// Transport type (stdio or http). Overrides config file.
    #[arg(long, env = "WARDEN_TRANSPORT")]
    pub transport: Option<Transport>,

    /// Always answer with a single JSON body, never an SSE stream.
    #[arg(long, env = "WARDEN_JSON_RESPONSE")]
    pub json_response: bool,

    /// Log level when RUST_LOG is unset. Overrides config file.
    #[arg(long, env = "WARDEN_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl ServeArgs {
    fn apply(&self, config: &mut WardenConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        if self.json_response {
            config.server.json_response = true;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

pub async fn run(args: ServeArgs) -> Result<()> {
    let (mut config, loaded) = super::load_config(&args.config)?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    super::init_logging(&config.logging.level);
    if loaded {
        info!(path = ?args.config, "Loaded configuration");
    } else {
        warn!(path = ?args.config, "Configuration file not found, using defaults");
    }
    if config.auth.api_keys.is_empty() {
        warn!("No api_keys configured: any non-empty credential is accepted");
    }

    let server = Arc::new(McpServer::from_config(&config)?);
    server.start().await;

    let served = match config.server.transport {
        Transport::Http => {
            HttpServer::new(server.clone(), config.server.clone())
                .run(shutdown_signal())
                .await
        }
        Transport::Stdio => {
            let ctx = StdioTransport::context_from_env(&config.auth);
            tokio::select! {
                result = StdioTransport::new(server.clone(), ctx).run() => result,
                _ = shutdown_signal() => Ok(()),
            }
        }
    };

    server.stop().await;
    served?;
    info!("Warden stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
