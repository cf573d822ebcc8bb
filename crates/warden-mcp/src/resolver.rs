//! Audited credential access for handlers.

use async_trait::async_trait;
use std::sync::Arc;
use warden_audit::AuditLogger;
use warden_core::{Credential, CredentialResolver, SessionError, SessionId};

/// Wraps a resolver so every handler lookup leaves an audit record.
pub struct AuditedResolver {
    inner: Arc<dyn CredentialResolver>,
    audit: Arc<AuditLogger>,
}

impl AuditedResolver {
    pub fn new(inner: Arc<dyn CredentialResolver>, audit: Arc<AuditLogger>) -> Self {
        Self { inner, audit }
    }
}

#[async_trait]
impl CredentialResolver for AuditedResolver {
    async fn resolve_credential(&self, session_id: &SessionId) -> Result<Credential, SessionError> {
        let outcome = self.inner.resolve_credential(session_id).await;
        let logged = match &outcome {
            Ok(_) => self.audit.log_credential_resolved(session_id.as_str()).await,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "Credential unavailable");
                self.audit
                    .log_credential_unavailable(session_id.as_str(), &e.to_string())
                    .await
            }
        };
        if let Err(e) = logged {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::AuditEventType;
    use warden_session::{SessionManager, SessionPolicy};

    #[tokio::test]
    async fn test_lookups_are_audited() {
        let sessions = Arc::new(SessionManager::in_memory(SessionPolicy::default()));
        let session_id = sessions.authenticate(Credential::new("key-123")).await.unwrap();
        let (logger, storage) = AuditLogger::in_memory();
        let resolver = AuditedResolver::new(sessions, Arc::new(logger));

        let credential = resolver.resolve_credential(&session_id).await.unwrap();
        assert_eq!(credential.expose(), "key-123");
        assert!(resolver
            .resolve_credential(&SessionId::new("sess-zzz"))
            .await
            .is_err());

        let kinds: Vec<_> = storage.events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventType::CredentialResolved,
                AuditEventType::CredentialUnavailable
            ]
        );
    }
}
