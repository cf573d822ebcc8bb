//! The connection-establishment context middleware entries inspect.

use std::collections::HashMap;
use std::net::IpAddr;

/// Everything known about a connection attempt.
///
/// Built by the transport. Header names are stored lower-cased so lookups are
/// case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct ConnectContext {
    pub query_params: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub client_ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ConnectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        if name == "user-agent" {
            self.user_agent = Some(value.clone());
        }
        self.headers.insert(name, value);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let ctx = ConnectContext::new()
            .with_header("X-API-Key", "k")
            .with_header("User-Agent", "cli/1.0");
        assert_eq!(ctx.header("x-api-key"), Some("k"));
        assert_eq!(ctx.header("X-Api-Key"), Some("k"));
        assert_eq!(ctx.user_agent.as_deref(), Some("cli/1.0"));
    }
}
