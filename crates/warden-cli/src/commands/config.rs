//! `warden config`: validate or print a configuration file.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::{Path, PathBuf};
use warden_core::WardenConfig;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse and validate a configuration file.
    Check {
        #[arg(short, long, default_value = "warden.yaml")]
        config: PathBuf,
    },

    /// Print the effective configuration (defaults filled in) as YAML.
    Show {
        #[arg(short, long, default_value = "warden.yaml")]
        config: PathBuf,
    },
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Check { config } => {
            let parsed = check(&config)?;
            println!("✅ {} is valid", config.display());
            println!("   Transport: {:?}", parsed.server.transport);
            println!("   Endpoint:  {}{}", parsed.server.bind_addr(), parsed.server.path);
            println!("   API keys:  {}", parsed.auth.api_keys.len());
            match parsed.session.ttl_secs {
                Some(ttl) => println!("   Session TTL: {}s", ttl),
                None => println!("   Session TTL: none"),
            }
        }
        ConfigCommand::Show { config } => {
            let (parsed, _) = super::load_config(&config)?;
            print!("{}", serde_yaml::to_string(&parsed)?);
        }
    }
    Ok(())
}

/// Unlike `serve`, a missing file is an error here.
fn check(path: &Path) -> Result<WardenConfig> {
    let config = WardenConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_accepts_valid_file() {
        let file = write_config("server:\n  port: 8080\nauth:\n  api_keys: [abc]\n");
        let config = check(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.api_keys, vec!["abc"]);
    }

    #[test]
    fn test_check_rejects_invalid_values() {
        let file = write_config("server:\n  port: 0\n");
        assert!(check(file.path()).is_err());

        let file = write_config("auth:\n  allowed_ips: [not-an-ip]\n");
        assert!(check(file.path()).is_err());
    }

    #[test]
    fn test_check_requires_the_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check(&dir.path().join("missing.yaml")).is_err());
    }
}
