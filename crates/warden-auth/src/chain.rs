//! The ordered middleware chain gating connection establishment.
//!
//! Entries are evaluated strictly in order; the first rejection wins and the
//! rest are skipped. The chain is stored as an immutable snapshot behind an
//! [`ArcSwap`]: an evaluation loads one snapshot up front, so entries added
//! or removed mid-evaluation only affect attempts that arrive afterwards.

use crate::context::ConnectContext;
use crate::error::AuthError;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Decision of a single middleware entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject(reason.into())
    }
}

/// One accept/reject gate evaluated during connection establishment.
///
/// Implementations must not mutate state shared with other entries. An
/// `Err` is treated as a rejection.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs and rejection reasons.
    fn name(&self) -> &str;

    async fn evaluate(&self, ctx: &ConnectContext) -> anyhow::Result<Verdict>;
}

type Entries = Vec<Arc<dyn Middleware>>;

/// Ordered, dynamically extensible sequence of middleware entries.
pub struct MiddlewareChain {
    entries: ArcSwap<Entries>,
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(self, middleware: impl Middleware + 'static) -> Self {
        self.push(Arc::new(middleware));
        self
    }

    /// Append an entry. Takes effect for attempts evaluated after this returns.
    pub fn push(&self, middleware: Arc<dyn Middleware>) {
        tracing::debug!(middleware = middleware.name(), "Registered middleware");
        self.entries.rcu(|current| {
            let mut next: Entries = current.iter().cloned().collect();
            next.push(middleware.clone());
            next
        });
    }

    /// Insert an entry at `index`, clamped to the chain length.
    pub fn insert(&self, index: usize, middleware: Arc<dyn Middleware>) {
        tracing::debug!(middleware = middleware.name(), index, "Inserted middleware");
        self.entries.rcu(|current| {
            let mut next: Entries = current.iter().cloned().collect();
            next.insert(index.min(next.len()), middleware.clone());
            next
        });
    }

    /// Remove every entry with this name. Returns whether any was removed.
    pub fn remove(&self, name: &str) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|m| m.name() != name)
                .cloned()
                .collect::<Entries>()
        });
        previous.iter().any(|m| m.name() == name)
    }

    /// Entry names in evaluation order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .load()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate the chain against a connection attempt.
    ///
    /// `Ok(())` only if every entry accepts. An entry that errors or panics
    /// rejects the attempt; the process is never brought down by one.
    pub async fn evaluate(&self, ctx: &ConnectContext) -> Result<(), AuthError> {
        let entries = self.entries.load_full();
        if entries.is_empty() {
            tracing::warn!("Middleware chain is empty, accepting connection");
            return Ok(());
        }

        for entry in entries.iter() {
            let name = entry.name();
            match AssertUnwindSafe(entry.evaluate(ctx)).catch_unwind().await {
                Ok(Ok(Verdict::Accept)) => {
                    tracing::trace!(middleware = name, "Middleware accepted");
                }
                Ok(Ok(Verdict::Reject(reason))) => {
                    tracing::info!(middleware = name, reason = %reason, "Connection rejected");
                    return Err(AuthError::Rejected {
                        middleware: name.to_string(),
                        reason,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(middleware = name, error = %e, "Middleware failed");
                    return Err(AuthError::MiddlewareFailed {
                        middleware: name.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::error!(middleware = name, "Middleware panicked");
                    return Err(AuthError::MiddlewareFailed {
                        middleware: name.to_string(),
                        reason: "panicked".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
