//! Built-in middleware entries.

mod api_key;
mod client_ip;

pub use api_key::ApiKeyMiddleware;
pub use client_ip::ClientIpMiddleware;

use crate::chain::MiddlewareChain;
use crate::error::AuthError;
use warden_core::config::AuthConfig;

/// Build the default chain for a configuration.
///
/// The IP allow-list runs first when configured, then the API key check.
pub fn chain_from_config(config: &AuthConfig) -> Result<MiddlewareChain, AuthError> {
    let mut chain = MiddlewareChain::new();
    if !config.allowed_ips.is_empty() {
        chain = chain.with(ClientIpMiddleware::from_config(config)?);
    }
    Ok(chain.with(ApiKeyMiddleware::from_config(config)))
}
