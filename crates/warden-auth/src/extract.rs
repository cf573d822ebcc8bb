//! Credential extraction from a connection attempt.

use crate::context::ConnectContext;
use warden_core::Credential;
use warden_core::config::AuthConfig;

/// Finds the credential a client presented.
///
/// Lookup order: query parameter, dedicated header, then
/// `Authorization: Bearer <token>` when enabled. Blank values are skipped.
#[derive(Debug, Clone)]
pub struct CredentialExtractor {
    query_param: String,
    header: String,
    allow_bearer: bool,
}

impl CredentialExtractor {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            query_param: config.query_param.clone(),
            header: config.header.to_ascii_lowercase(),
            allow_bearer: config.allow_bearer,
        }
    }

    pub fn extract(&self, ctx: &ConnectContext) -> Option<Credential> {
        if let Some(v) = ctx.query(&self.query_param) {
            let s = v.trim();
            if !s.is_empty() {
                return Some(Credential::new(s));
            }
        }
        if let Some(v) = ctx.header(&self.header) {
            let s = v.trim();
            if !s.is_empty() {
                return Some(Credential::new(s));
            }
        }
        if self.allow_bearer {
            if let Some(rest) = ctx.header("authorization").and_then(|v| v.strip_prefix("Bearer ")) {
                let rest = rest.trim();
                if !rest.is_empty() {
                    return Some(Credential::new(rest));
                }
            }
        }
        None
    }
}

impl Default for CredentialExtractor {
    fn default() -> Self {
        Self::new(&AuthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_wins() {
        let ctx = ConnectContext::new()
            .with_query("key", "from-query")
            .with_header("x-api-key", "from-header")
            .with_header("Authorization", "Bearer from-bearer");
        let credential = CredentialExtractor::default().extract(&ctx).unwrap();
        assert_eq!(credential.expose(), "from-query");
    }

    #[test]
    fn test_header_then_bearer() {
        let extractor = CredentialExtractor::default();

        let ctx = ConnectContext::new()
            .with_query("key", "  ")
            .with_header("X-Api-Key", "from-header");
        assert_eq!(extractor.extract(&ctx).unwrap().expose(), "from-header");

        let ctx = ConnectContext::new().with_header("authorization", "Bearer tok-1");
        assert_eq!(extractor.extract(&ctx).unwrap().expose(), "tok-1");
    }

    #[test]
    fn test_bearer_can_be_disabled() {
        let extractor = CredentialExtractor::new(&AuthConfig {
            allow_bearer: false,
            ..Default::default()
        });
        let ctx = ConnectContext::new().with_header("authorization", "Bearer tok-1");
        assert!(extractor.extract(&ctx).is_none());
    }

    #[test]
    fn test_custom_names() {
        let extractor = CredentialExtractor::new(&AuthConfig {
            query_param: "token".to_string(),
            header: "X-Token".to_string(),
            ..Default::default()
        });
        let ctx = ConnectContext::new().with_header("x-token", "abc");
        assert_eq!(extractor.extract(&ctx).unwrap().expose(), "abc");
        assert!(extractor
            .extract(&ConnectContext::new().with_query("key", "ignored"))
            .is_none());
    }
}
