//! Error types for connection authentication.

use thiserror::Error;
use warden_core::SessionError;

/// Errors raised while establishing a connection.
///
/// Every variant means no session was created.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A middleware entry rejected the attempt.
    #[error("rejected by {middleware}: {reason}")]
    Rejected { middleware: String, reason: String },

    /// A middleware entry errored or panicked; treated as a rejection.
    #[error("middleware {middleware} failed: {reason}")]
    MiddlewareFailed { middleware: String, reason: String },

    /// The request carried no usable credential.
    #[error("no credential presented")]
    MissingCredential,

    /// Middleware configuration could not be built.
    #[error("invalid auth configuration: {0}")]
    InvalidConfig(String),

    /// The session manager could not mint a session.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuthError {
    /// Whether the client is at fault (401) rather than the server (500).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::MiddlewareFailed { .. } | Self::MissingCredential
        )
    }
}
