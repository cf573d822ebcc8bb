//! Error types for credential stores.

use thiserror::Error;
use warden_core::{SessionError, SessionId};

/// Errors returned by a [`CredentialStore`](crate::CredentialStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A live record already uses this id.
    #[error("session id already in use: {0}")]
    Conflict(SessionId),

    /// The backing storage could not be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err.to_string())
    }
}
