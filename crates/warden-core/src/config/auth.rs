//! Connection authentication configuration.

use serde::{Deserialize, Serialize};

/// Settings for the connect-time middleware chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accepted API keys. Empty accepts any non-empty credential.
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Client IPs allowed to connect. Empty allows every address.
    #[serde(default)]
    pub allowed_ips: Vec<String>,

    /// Query parameter carrying the credential.
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// Header carrying the credential.
    #[serde(default = "default_header")]
    pub header: String,

    /// Also accept `Authorization: Bearer <token>`.
    #[serde(default = "default_allow_bearer")]
    pub allow_bearer: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            allowed_ips: Vec::new(),
            query_param: default_query_param(),
            header: default_header(),
            allow_bearer: default_allow_bearer(),
        }
    }
}

fn default_query_param() -> String {
    "key".to_string()
}

fn default_header() -> String {
    "x-api-key".to_string()
}

fn default_allow_bearer() -> bool {
    true
}
