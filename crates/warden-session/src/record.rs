//! The stored association between a session id and its credential.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use warden_core::{Credential, SessionId};

/// One live session.
///
/// Exactly one credential per session id. After creation only the access
/// time, expiry and metadata change.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
}

impl SessionRecord {
    /// Create a record, optionally expiring `ttl` from `now`.
    pub fn new(
        session_id: SessionId,
        credential: Credential,
        now: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            session_id,
            credential,
            created_at: now,
            last_accessed_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the record is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_ttl_never_expires() {
        let now = Utc::now();
        let record = SessionRecord::new("sess-a".into(), Credential::new("k"), now, None);
        assert!(record.expires_at.is_none());
        assert!(!record.is_expired_at(now + Duration::days(3650)));
    }

    #[test]
    fn test_record_expiry_boundary() {
        let now = Utc::now();
        let record = SessionRecord::new(
            "sess-a".into(),
            Credential::new("k"),
            now,
            Some(Duration::seconds(10)),
        );
        assert!(!record.is_expired_at(now + Duration::seconds(10)));
        assert!(record.is_expired_at(now + Duration::seconds(11)));
    }
}
