//! # warden-auth
//!
//! Connection gating for Warden.
//!
//! A [`ConnectContext`] built by the transport runs through a
//! [`MiddlewareChain`]; only when every entry accepts does the
//! [`ConnectionAuthenticator`] extract the credential and ask the session
//! manager for a session id.

pub mod authenticator;
pub mod chain;
pub mod context;
pub mod error;
pub mod extract;
pub mod middlewares;

pub use authenticator::ConnectionAuthenticator;
pub use chain::{Middleware, MiddlewareChain, Verdict};
pub use context::ConnectContext;
pub use error::AuthError;
pub use extract::CredentialExtractor;
pub use middlewares::{ApiKeyMiddleware, ClientIpMiddleware, chain_from_config};
