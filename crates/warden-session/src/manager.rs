//! Session manager.
//!
//! Owns the lifecycle policy of the credential store: minting unique ids,
//! expiry, per-credential caps and invalidation. It is also a
//! [`Service`]: starting it spawns the background expiry sweeper.

use crate::id::generate_session_id;
use crate::record::SessionRecord;
use crate::store::{CredentialStore, MemoryCredentialStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use warden_core::config::SessionConfig;
use warden_core::{Credential, CredentialResolver, Service, ServiceStatus, SessionError, SessionId};

/// Attempts at drawing a fresh id before giving up.
const MAX_ID_ATTEMPTS: usize = 4;

/// Runtime form of [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub ttl: Option<Duration>,
    pub sliding_expiry: bool,
    pub sweep_interval: Option<std::time::Duration>,
    pub max_sessions_per_credential: Option<usize>,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ttl: config.ttl(),
            sliding_expiry: config.sliding_expiry,
            sweep_interval: config.sweep_interval(),
            max_sessions_per_credential: config.max_sessions_per_credential,
        }
    }
}

/// Outcome of [`SessionManager::mint`].
#[derive(Debug, Clone)]
pub struct MintedSession {
    pub session_id: SessionId,
    /// Older sessions of the same credential removed by the cap.
    pub evicted: Vec<SessionId>,
}

/// Creates, resolves and invalidates sessions.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    policy: SessionPolicy,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager over the given store.
    pub fn new(store: Arc<dyn CredentialStore>, policy: SessionPolicy) -> Self {
        Self {
            store,
            policy,
            sweeper: Mutex::new(None),
        }
    }

    /// Create a manager over a fresh in-memory store.
    pub fn in_memory(policy: SessionPolicy) -> Self {
        Self::new(Arc::new(MemoryCredentialStore::new()), policy)
    }

    pub fn policy(&self) -> &SessionPolicy {
        &self.policy
    }

    /// Mint a new session for an accepted credential.
    ///
    /// Only called after the middleware chain has accepted the connection.
    /// A second call with the same credential creates an independent session.
    pub async fn authenticate(&self, credential: Credential) -> Result<SessionId, SessionError> {
        self.authenticate_with_metadata(credential, BTreeMap::new()).await
    }

    /// Like [`authenticate`](Self::authenticate), attaching initial metadata.
    pub async fn authenticate_with_metadata(
        &self,
        credential: Credential,
        metadata: BTreeMap<String, String>,
    ) -> Result<SessionId, SessionError> {
        self.mint(credential, metadata)
            .await
            .map(|minted| minted.session_id)
    }

    /// Mint a session and report the sessions the per-credential cap evicted
    /// to make room for it.
    pub async fn mint(
        &self,
        credential: Credential,
        metadata: BTreeMap<String, String>,
    ) -> Result<MintedSession, SessionError> {
        if credential.is_empty() {
            return Err(SessionError::EmptyCredential);
        }

        let mut session_id = None;
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = generate_session_id();
            let record =
                SessionRecord::new(candidate.clone(), credential.clone(), Utc::now(), self.policy.ttl)
                    .with_metadata(metadata.clone());
            match self.store.insert(record).await {
                Ok(()) => {
                    session_id = Some(candidate);
                    break;
                }
                Err(StoreError::Conflict(id)) => {
                    tracing::warn!(session_id = %id, "Session id collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let session_id = session_id.ok_or(SessionError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })?;

        let evicted = self.enforce_credential_cap(&credential, &session_id).await?;

        tracing::info!(
            session_id = %session_id,
            expires = self.policy.ttl.is_some(),
            evicted = evicted.len(),
            "Session created"
        );
        Ok(MintedSession {
            session_id,
            evicted,
        })
    }

    // Evict least recently used sessions of this credential beyond the cap,
    // never the one just minted.
    async fn enforce_credential_cap(
        &self,
        credential: &Credential,
        keep: &SessionId,
    ) -> Result<Vec<SessionId>, SessionError> {
        let Some(max) = self.policy.max_sessions_per_credential else {
            return Ok(Vec::new());
        };

        let mut sessions = self.store.sessions_for(credential).await?;
        if sessions.len() <= max {
            return Ok(Vec::new());
        }

        sessions.retain(|(id, _)| id != keep);
        sessions.sort_by_key(|(_, accessed)| *accessed);
        let excess = sessions.len() + 1 - max;
        let mut evicted = Vec::with_capacity(excess);
        for (id, _) in sessions.into_iter().take(excess) {
            // A concurrent invalidation may have removed it already.
            if self.store.remove(&id).await?.is_some() {
                tracing::info!(session_id = %id, max, "Evicted session over per-credential cap");
                evicted.push(id);
            }
        }
        Ok(evicted)
    }

    /// Resolve the credential behind a session.
    ///
    /// Expiry is checked here regardless of the sweeper. Resolution only
    /// extends the expiry when sliding expiry is configured.
    pub async fn resolve_credential(&self, session_id: &SessionId) -> Result<Credential, SessionError> {
        let record = self.live_record(session_id).await?;
        Ok(record.credential)
    }

    /// Check that a session is live, recording the access.
    pub async fn ensure_live(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.live_record(session_id).await.map(|_| ())
    }

    async fn live_record(&self, session_id: &SessionId) -> Result<SessionRecord, SessionError> {
        let now = Utc::now();
        let record = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| SessionError::NotFound {
                session_id: session_id.clone(),
            })?;

        if let Some(expired_at) = record.expires_at.filter(|_| record.is_expired_at(now)) {
            tracing::debug!(session_id = %session_id, "Session expired");
            return Err(SessionError::Expired {
                session_id: session_id.clone(),
                expired_at,
            });
        }

        let extend_to = match (self.policy.sliding_expiry, self.policy.ttl) {
            (true, Some(ttl)) => Some(now + ttl),
            _ => None,
        };
        self.store.touch(session_id, now, extend_to).await?;
        Ok(record)
    }

    /// Re-arm the TTL of a live session. No-op when sessions do not expire.
    pub async fn refresh(&self, session_id: &SessionId) -> Result<(), SessionError> {
        self.live_record(session_id).await?;
        if let Some(ttl) = self.policy.ttl {
            let now = Utc::now();
            self.store.touch(session_id, now, Some(now + ttl)).await?;
        }
        Ok(())
    }

    /// Attach a metadata entry to a live session.
    pub async fn set_metadata(
        &self,
        session_id: &SessionId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.live_record(session_id).await?;
        if self
            .store
            .set_metadata(session_id, key.into(), value.into())
            .await?
        {
            Ok(())
        } else {
            // Invalidated between the liveness check and the write.
            Err(SessionError::NotFound {
                session_id: session_id.clone(),
            })
        }
    }

    /// Metadata of a live session.
    pub async fn metadata(&self, session_id: &SessionId) -> Result<BTreeMap<String, String>, SessionError> {
        Ok(self.live_record(session_id).await?.metadata)
    }

    /// Remove a session. Removing an unknown session is not an error.
    ///
    /// Returns whether a record was removed.
    pub async fn invalidate(&self, session_id: &SessionId) -> Result<bool, SessionError> {
        let removed = self.store.remove(session_id).await?.is_some();
        if removed {
            tracing::info!(session_id = %session_id, "Session invalidated");
        }
        Ok(removed)
    }

    /// Live sessions held by a credential.
    pub async fn sessions_for_credential(
        &self,
        credential: &Credential,
    ) -> Result<Vec<SessionId>, SessionError> {
        let now = Utc::now();
        let mut live = Vec::new();
        for (id, _) in self.store.sessions_for(credential).await? {
            if let Some(record) = self.store.get(&id).await? {
                if !record.is_expired_at(now) {
                    live.push(id);
                }
            }
        }
        Ok(live)
    }

    /// Purge expired records now.
    pub async fn sweep_expired(&self) -> Result<usize, SessionError> {
        let purged = self.store.purge_expired(Utc::now()).await?;
        if purged > 0 {
            tracing::debug!(purged, "Swept expired sessions");
        }
        Ok(purged)
    }

    /// Stored records, including expired ones not yet swept.
    pub async fn live_count(&self) -> Result<usize, SessionError> {
        Ok(self.store.len().await?)
    }

    fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

#[async_trait]
impl CredentialResolver for SessionManager {
    async fn resolve_credential(&self, session_id: &SessionId) -> Result<Credential, SessionError> {
        SessionManager::resolve_credential(self, session_id).await
    }
}

#[async_trait]
impl Service for SessionManager {
    fn name(&self) -> &str {
        "sessions"
    }

    async fn start(&self) -> anyhow::Result<()> {
        let Some(interval) = self.policy.sweep_interval else {
            tracing::info!("Session sweeper disabled; expiry enforced at read time only");
            return Ok(());
        };

        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!("Session sweeper already running");
            return Ok(());
        }

        let store = self.store.clone();
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Swept expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                }
            }
        }));
        tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::info!("Session sweeper stopped");
        }
        Ok(())
    }

    fn status(&self) -> ServiceStatus {
        if self.policy.sweep_interval.is_none() || self.sweeper_running() {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        }
    }
}
