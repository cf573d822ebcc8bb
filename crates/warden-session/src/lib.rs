//! # warden-session
//!
//! Decouples "who proved who they are" from "what they authenticated with".
//!
//! After a connection passes the middleware chain, the [`SessionManager`]
//! mints a fresh [`SessionId`](warden_core::SessionId) and stores the
//! original credential under it in a [`CredentialStore`]. Clients only ever
//! present the session id afterwards; handlers that genuinely need the
//! credential resolve it through the manager's
//! [`CredentialResolver`](warden_core::CredentialResolver) implementation.
//!
//! ## Lifecycle
//!
//! | Event | Effect |
//! |-------|--------|
//! | `authenticate` | New record, unique id, optional expiry |
//! | `resolve_credential` | Expiry checked at read time; sliding expiry optional |
//! | `invalidate` | Record removed; idempotent |
//! | sweeper tick | Expired records purged in the background |

pub mod error;
pub mod id;
pub mod manager;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use id::generate_session_id;
pub use manager::{MintedSession, SessionManager, SessionPolicy};
pub use record::SessionRecord;
pub use store::{CredentialStore, MemoryCredentialStore};
