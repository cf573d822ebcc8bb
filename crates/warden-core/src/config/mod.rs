//! Configuration types for Warden.
//!
//! Everything is loaded from a single YAML file. Every field has a default,
//! so an empty file (or no file at all) yields a working development setup.
//!
//! ```yaml
//! server:
//!   port: 3000
//!   json_response: false
//! session:
//!   ttl_secs: 3600
//!   sliding_expiry: true
//! auth:
//!   api_keys: ["key-123"]
//! dispatch:
//!   timeout_secs: 30
//! ```

pub mod audit;
pub mod auth;
pub mod server;
pub mod session;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;

pub use audit::AuditConfig;
pub use auth::AuthConfig;
pub use server::{ServerConfig, Transport};
pub use session::SessionConfig;

/// Complete Warden configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tool dispatch policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-invocation timeout in seconds. `None` lets handlers run to completion.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_secs.map(std::time::Duration::from_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl WardenConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.path must start with '/', got '{}'",
                self.server.path
            )));
        }
        if self.server.path == "/health" {
            return Err(ConfigError::Invalid("server.path '/health' is reserved".into()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be non-zero".into()));
        }
        if self.session.ttl_secs == Some(0) {
            return Err(ConfigError::Invalid("session.ttl_secs must be non-zero".into()));
        }
        if self.session.sweep_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "session.sweep_interval_secs must be non-zero".into(),
            ));
        }
        if self.session.max_sessions_per_credential == Some(0) {
            return Err(ConfigError::Invalid(
                "session.max_sessions_per_credential must be non-zero".into(),
            ));
        }
        if self.dispatch.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("dispatch.timeout_secs must be non-zero".into()));
        }
        for ip in &self.auth.allowed_ips {
            ip.parse::<IpAddr>().map_err(|_| {
                ConfigError::Invalid(format!("auth.allowed_ips: '{ip}' is not an IP address"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WardenConfig::from_yaml("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.path, "/mcp");
        assert_eq!(config.session.max_sessions_per_credential, Some(5));
        assert_eq!(config.auth.query_param, "key");
        assert!(config.session.ttl().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
server:
  name: test-server
  transport: stdio
  port: 8080
  json_response: true
session:
  ttl_secs: 600
  sliding_expiry: true
  sweep_interval_secs: null
  max_sessions_per_credential: null
auth:
  api_keys: ["key-123"]
  allowed_ips: ["127.0.0.1", "::1"]
dispatch:
  timeout_secs: 5
audit:
  enabled: false
logging:
  level: debug
"#;
        let config = WardenConfig::from_yaml(yaml).unwrap();
        assert!(config.server.is_stdio());
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8080");
        assert!(config.server.json_response);
        assert_eq!(config.session.ttl().unwrap().num_seconds(), 600);
        assert!(config.session.sliding_expiry);
        assert!(config.session.sweep_interval().is_none());
        assert!(config.session.max_sessions_per_credential.is_none());
        assert_eq!(config.auth.api_keys, vec!["key-123"]);
        assert_eq!(config.dispatch.timeout().unwrap().as_secs(), 5);
        assert!(!config.audit.enabled);
        assert_eq!(config.logging.level, "debug");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WardenConfig::default();
        config.session.ttl_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = WardenConfig::default();
        config.auth.allowed_ips = vec!["not-an-ip".into()];
        assert!(config.validate().is_err());

        let mut config = WardenConfig::default();
        config.server.path = "mcp".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  port: 4000").unwrap();
        let config = WardenConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_unknown_transport_is_an_error() {
        assert!(WardenConfig::from_yaml("server:\n  transport: carrier-pigeon").is_err());
        assert_eq!("HTTP".parse::<Transport>().unwrap(), Transport::Http);
    }
}
