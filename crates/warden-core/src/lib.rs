//! # warden-core
//!
//! Types shared by every Warden crate.
//!
//! - [`Credential`] and [`SessionId`]: what a client proved, and the opaque
//!   identity it is given in exchange
//! - [`CredentialResolver`]: the capability handlers use to map a session back
//!   to its credential
//! - [`Service`] and [`ServiceRegistry`]: long-lived collaborators with a
//!   start/stop lifecycle
//! - [`config`]: the YAML configuration model

pub mod config;
pub mod error;
pub mod service;
pub mod session;

pub use config::WardenConfig;
pub use error::{ConfigError, ServiceError};
pub use service::{Service, ServiceRegistry, ServiceStatus, ServiceView};
pub use session::{Credential, CredentialResolver, SessionError, SessionId};
