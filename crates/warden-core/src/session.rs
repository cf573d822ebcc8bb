//! Session identity primitives.
//!
//! A [`Credential`] is whatever the client proved possession of when it
//! connected (API key, bearer token). A [`SessionId`] is the opaque handle it
//! receives in exchange and presents on every later request. The two are only
//! ever linked through a [`CredentialResolver`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Original credential material presented at connection time.
///
/// Immutable once constructed. `Debug` is redacted so a credential never ends
/// up in logs by accident; use [`Credential::expose`] where the raw value is
/// genuinely required.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap raw credential material.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw credential value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the credential carries no material at all.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Opaque, unique session identifier handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier string without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an identifier received from a client.
    ///
    /// Only non-empty strings of visible ASCII (0x21..=0x7E) are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        if Self::is_well_formed(raw) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    /// Check the visible-ASCII shape required of session identifiers.
    pub fn is_well_formed(raw: &str) -> bool {
        !raw.is_empty() && raw.bytes().all(|b| (0x21..=0x7e).contains(&b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Errors raised when resolving or managing a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No live record exists for the session id.
    #[error("session not found: {session_id}")]
    NotFound { session_id: SessionId },

    /// The record exists but its expiry has passed.
    #[error("session {session_id} expired at {expired_at}")]
    Expired {
        session_id: SessionId,
        expired_at: DateTime<Utc>,
    },

    /// The credential presented for a new session carries no material.
    #[error("credential is empty")]
    EmptyCredential,

    /// A unique session id could not be allocated.
    #[error("could not allocate a unique session id after {attempts} attempts")]
    IdExhausted { attempts: usize },

    /// The backing credential store failed.
    #[error("credential store error: {0}")]
    Store(String),
}

impl SessionError {
    /// Whether this error means the session id itself is unusable
    /// (unknown, invalidated or expired), as opposed to an internal fault.
    pub fn is_invalid_session(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Expired { .. })
    }
}

/// Capability to map a session id back to its original credential.
///
/// Handlers reach this through the service view they are invoked with; they
/// never see the credential store directly.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve the credential behind a live session.
    async fn resolve_credential(&self, session_id: &SessionId) -> Result<Credential, SessionError>;
}
