//! Connection establishment: chain, credential, session.

use crate::chain::MiddlewareChain;
use crate::context::ConnectContext;
use crate::error::AuthError;
use crate::extract::CredentialExtractor;
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_audit::AuditLogger;
use warden_core::{SessionError, SessionId};
use warden_session::SessionManager;

/// Turns an accepted connection attempt into a session.
pub struct ConnectionAuthenticator {
    chain: Arc<MiddlewareChain>,
    extractor: CredentialExtractor,
    sessions: Arc<SessionManager>,
    audit: Arc<AuditLogger>,
}

impl ConnectionAuthenticator {
    pub fn new(
        chain: Arc<MiddlewareChain>,
        extractor: CredentialExtractor,
        sessions: Arc<SessionManager>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            chain,
            extractor,
            sessions,
            audit,
        }
    }

    pub fn chain(&self) -> &Arc<MiddlewareChain> {
        &self.chain
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Evaluate the chain and, on acceptance, mint a session.
    ///
    /// On any failure no session exists and nothing was stored.
    pub async fn connect(&self, ctx: &ConnectContext) -> Result<SessionId, AuthError> {
        let client_ip = ctx.client_ip.map(|ip| ip.to_string());

        match self.establish(ctx).await {
            Ok(session_id) => {
                if let Err(e) = self
                    .audit
                    .log_session_created(session_id.as_str(), client_ip.as_deref())
                    .await
                {
                    tracing::warn!(error = %e, "Failed to write audit event");
                }
                Ok(session_id)
            }
            Err(err) => {
                if err.is_rejection() {
                    if let Err(e) = self
                        .audit
                        .log_authentication_failed(&err.to_string(), client_ip.as_deref())
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to write audit event");
                    }
                } else {
                    tracing::error!(error = %err, "Session creation failed");
                }
                Err(err)
            }
        }
    }

    async fn establish(&self, ctx: &ConnectContext) -> Result<SessionId, AuthError> {
        self.chain.evaluate(ctx).await?;

        let credential = self
            .extractor
            .extract(ctx)
            .ok_or(AuthError::MissingCredential)?;

        let mut metadata = BTreeMap::new();
        if let Some(ip) = ctx.client_ip {
            metadata.insert("client_ip".to_string(), ip.to_string());
        }
        if let Some(ref agent) = ctx.user_agent {
            metadata.insert("user_agent".to_string(), agent.clone());
        }

        let minted = self
            .sessions
            .mint(credential, metadata)
            .await
            .map_err(|e| match e {
                SessionError::EmptyCredential => AuthError::MissingCredential,
                other => AuthError::Session(other),
            })?;

        for evicted in &minted.evicted {
            if let Err(e) = self.audit.log_session_invalidated(evicted.as_str()).await {
                tracing::warn!(error = %e, "Failed to write audit event");
            }
        }
        Ok(minted.session_id)
    }

    /// Invalidate a session. Unknown sessions are not an error.
    pub async fn disconnect(&self, session_id: &SessionId) -> Result<bool, AuthError> {
        let removed = self.sessions.invalidate(session_id).await?;
        if removed {
            if let Err(e) = self.audit.log_session_invalidated(session_id.as_str()).await {
                tracing::warn!(error = %e, "Failed to write audit event");
            }
        }
        Ok(removed)
    }
}
