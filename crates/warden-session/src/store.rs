//! Credential store backends.
//!
//! The store is a key-value lookup from session id to [`SessionRecord`]. It
//! only has to guarantee read-after-write consistency within one process; the
//! expiry policy lives in the [`SessionManager`](crate::SessionManager).

use crate::error::StoreError;
use crate::record::SessionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use warden_core::{Credential, SessionId};

/// Trait for credential store backends.
///
/// Implementations serialize writers against each other and against readers;
/// a reader never observes a half-written record.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id is taken.
    async fn insert(&self, record: SessionRecord) -> Result<(), StoreError>;

    /// Fetch a record by id, expired or not.
    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Record an access, optionally moving the expiry. Returns whether the record exists.
    async fn touch(
        &self,
        session_id: &SessionId,
        accessed_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError>;

    /// Set one metadata entry. Returns whether the record exists.
    async fn set_metadata(
        &self,
        session_id: &SessionId,
        key: String,
        value: String,
    ) -> Result<bool, StoreError>;

    /// Remove a record, returning it if it existed.
    async fn remove(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError>;

    /// Sessions held by a credential with their last access time.
    async fn sessions_for(
        &self,
        credential: &Credential,
    ) -> Result<Vec<(SessionId, DateTime<Utc>)>, StoreError>;

    /// Remove every record expired at `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Number of stored records, including expired ones not yet purged.
    async fn len(&self) -> Result<usize, StoreError>;
}

/// In-process store backed by a single `RwLock<HashMap>`.
///
/// Every operation holds the lock only for the map access itself; nothing
/// awaits while the guard is alive.
#[derive(Default)]
pub struct MemoryCredentialStore {
    records: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert(&self, record: SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(&record.session_id) {
            return Err(StoreError::Conflict(record.session_id));
        }
        records.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned())
    }

    async fn touch(
        &self,
        session_id: &SessionId,
        accessed_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = records.get_mut(session_id) else {
            return Ok(false);
        };
        record.last_accessed_at = accessed_at;
        if expires_at.is_some() {
            record.expires_at = expires_at;
        }
        Ok(true)
    }

    async fn set_metadata(
        &self,
        session_id: &SessionId,
        key: String,
        value: String,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(session_id) {
            Some(record) => {
                record.metadata.insert(key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, session_id: &SessionId) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id))
    }

    async fn sessions_for(
        &self,
        credential: &Credential,
    ) -> Result<Vec<(SessionId, DateTime<Utc>)>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| &r.credential == credential)
            .map(|r| (r.session_id.clone(), r.last_accessed_at))
            .collect())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - records.len())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().unwrap_or_else(PoisonError::into_inner).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, key: &str, ttl: Option<Duration>) -> SessionRecord {
        SessionRecord::new(id.into(), Credential::new(key), Utc::now(), ttl)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryCredentialStore::new();
        store.insert(record("sess-1", "key-1", None)).await.unwrap();

        let found = store.get(&"sess-1".into()).await.unwrap().unwrap();
        assert_eq!(found.credential.expose(), "key-1");
        assert!(store.get(&"sess-2".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_conflict_keeps_original() {
        let store = MemoryCredentialStore::new();
        store.insert(record("sess-1", "key-1", None)).await.unwrap();

        let err = store.insert(record("sess-1", "key-2", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.get(&"sess-1".into()).await.unwrap().unwrap();
        assert_eq!(found.credential.expose(), "key-1");
    }

    #[tokio::test]
    async fn test_touch_and_metadata() {
        let store = MemoryCredentialStore::new();
        store.insert(record("sess-1", "key-1", None)).await.unwrap();

        let later = Utc::now() + Duration::seconds(5);
        assert!(store.touch(&"sess-1".into(), later, Some(later)).await.unwrap());
        assert!(!store.touch(&"nope".into(), later, None).await.unwrap());

        assert!(
            store
                .set_metadata(&"sess-1".into(), "client".into(), "cli".into())
                .await
                .unwrap()
        );

        let found = store.get(&"sess-1".into()).await.unwrap().unwrap();
        assert_eq!(found.last_accessed_at, later);
        assert_eq!(found.expires_at, Some(later));
        assert_eq!(found.metadata.get("client").map(String::as_str), Some("cli"));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryCredentialStore::new();
        store
            .insert(record("sess-old", "k", Some(Duration::seconds(-1))))
            .await
            .unwrap();
        store.insert(record("sess-new", "k", None)).await.unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.len().await.unwrap(), 1);
        assert_eq!(store.sessions_for(&Credential::new("k")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryCredentialStore::new();
        store.insert(record("sess-1", "k", None)).await.unwrap();
        assert!(store.remove(&"sess-1".into()).await.unwrap().is_some());
        assert!(store.remove(&"sess-1".into()).await.unwrap().is_none());
    }
}
