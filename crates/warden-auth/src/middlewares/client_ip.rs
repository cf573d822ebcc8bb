use crate::chain::{Middleware, Verdict};
use crate::context::ConnectContext;
use crate::error::AuthError;
use async_trait::async_trait;
use std::net::IpAddr;
use warden_core::config::AuthConfig;

/// Allows only listed client addresses. An empty list allows everyone.
#[derive(Debug, Clone, Default)]
pub struct ClientIpMiddleware {
    allowed: Vec<IpAddr>,
}

impl ClientIpMiddleware {
    pub fn new(allowed: Vec<IpAddr>) -> Self {
        Self { allowed }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let allowed = config
            .allowed_ips
            .iter()
            .map(|raw| {
                raw.parse::<IpAddr>()
                    .map_err(|e| AuthError::InvalidConfig(format!("allowed_ips entry '{raw}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(allowed))
    }
}

#[async_trait]
impl Middleware for ClientIpMiddleware {
    fn name(&self) -> &str {
        "client_ip"
    }

    async fn evaluate(&self, ctx: &ConnectContext) -> anyhow::Result<Verdict> {
        if self.allowed.is_empty() {
            return Ok(Verdict::Accept);
        }
        match ctx.client_ip {
            Some(ip) if self.allowed.contains(&ip) => Ok(Verdict::Accept),
            Some(ip) => Ok(Verdict::reject(format!("client address {ip} not allowed"))),
            None => Ok(Verdict::reject("client address unknown")),
        }
    }
}
