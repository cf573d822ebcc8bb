//! Server and transport configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the MCP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Name reported in `serverInfo` during initialization.
    #[serde(default = "default_name")]
    pub name: String,

    /// Transport type: "stdio" or "http".
    #[serde(default)]
    pub transport: Transport,

    /// HTTP host (only used when transport is HTTP).
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port (only used when transport is HTTP).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the MCP endpoint.
    #[serde(default = "default_path")]
    pub path: String,

    /// Reply with a single JSON body instead of an SSE stream.
    #[serde(default)]
    pub json_response: bool,

    /// Largest accepted request body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// MCP transport type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Streamable HTTP transport.
    #[default]
    Http,
    /// Standard input/output transport.
    Stdio,
}

impl std::str::FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "stdio" => Ok(Self::Stdio),
            other => Err(format!("unknown transport '{other}' (expected http or stdio)")),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            transport: Transport::default(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
            json_response: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_http(&self) -> bool {
        self.transport == Transport::Http
    }

    pub fn is_stdio(&self) -> bool {
        self.transport == Transport::Stdio
    }
}

fn default_name() -> String {
    "warden".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_path() -> String {
    "/mcp".to_string()
}

fn default_max_body_bytes() -> usize {
    4 * 1024 * 1024
}
