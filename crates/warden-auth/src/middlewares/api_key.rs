use crate::chain::{Middleware, Verdict};
use crate::context::ConnectContext;
use crate::extract::CredentialExtractor;
use async_trait::async_trait;
use std::collections::HashSet;
use warden_core::config::AuthConfig;

/// Requires a credential, and when keys are configured, one of them.
#[derive(Debug, Clone)]
pub struct ApiKeyMiddleware {
    keys: HashSet<String>,
    extractor: CredentialExtractor,
}

impl ApiKeyMiddleware {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>, extractor: CredentialExtractor) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            extractor,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.api_keys.iter().cloned(), CredentialExtractor::new(config))
    }
}

#[async_trait]
impl Middleware for ApiKeyMiddleware {
    fn name(&self) -> &str {
        "api_key"
    }

    async fn evaluate(&self, ctx: &ConnectContext) -> anyhow::Result<Verdict> {
        let Some(credential) = self.extractor.extract(ctx) else {
            return Ok(Verdict::reject("missing credential"));
        };
        if self.keys.is_empty() || self.keys.contains(credential.expose()) {
            Ok(Verdict::Accept)
        } else {
            Ok(Verdict::reject("invalid credential"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_credential() {
        let mw = ApiKeyMiddleware::from_config(&AuthConfig::default());
        assert_eq!(
            mw.evaluate(&ConnectContext::new()).await.unwrap(),
            Verdict::reject("missing credential")
        );
        let ctx = ConnectContext::new().with_query("key", "anything");
        assert_eq!(mw.evaluate(&ctx).await.unwrap(), Verdict::Accept);
    }

    #[tokio::test]
    async fn test_checks_configured_keys() {
        let mw = ApiKeyMiddleware::from_config(&AuthConfig {
            api_keys: vec!["key-123".to_string()],
            ..Default::default()
        });
        let good = ConnectContext::new().with_header("x-api-key", "key-123");
        let bad = ConnectContext::new().with_header("x-api-key", "key-999");
        assert_eq!(mw.evaluate(&good).await.unwrap(), Verdict::Accept);
        assert_eq!(
            mw.evaluate(&bad).await.unwrap(),
            Verdict::reject("invalid credential")
        );
    }
}
