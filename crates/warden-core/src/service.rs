//! Long-lived services and their lifecycle.
//!
//! A [`Service`] lives for the whole process (credential store, session
//! sweeper, outbound clients). The [`ServiceRegistry`] starts services in
//! registration order and stops them in reverse; a service that fails to start
//! or stop is logged and marked failed without affecting the others.
//!
//! Handlers get a read-only [`ServiceView`]: the credential resolver plus
//! name-based lookup and status of registered services.

use crate::error::ServiceError;
use crate::session::CredentialResolver;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Lifecycle state reported by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ServiceStatus {
    Stopped,
    Running,
    Failed(String),
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A process-wide collaborator with an explicit start/stop lifecycle.
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique name used for registration and lookup.
    fn name(&self) -> &str;

    /// Acquire resources and begin background work.
    async fn start(&self) -> anyhow::Result<()>;

    /// Release resources. Must be safe to call when not running.
    async fn stop(&self) -> anyhow::Result<()>;

    /// Current lifecycle state.
    fn status(&self) -> ServiceStatus;
}

struct Entry {
    service: Arc<dyn Service>,
    failure: Option<String>,
}

/// Ordered registry of services owned by the process.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<Vec<Entry>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service. Names must be unique.
    pub fn register(&self, service: Arc<dyn Service>) -> Result<(), ServiceError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| e.service.name() == service.name()) {
            return Err(ServiceError::Duplicate {
                name: service.name().to_string(),
            });
        }
        tracing::debug!(service = service.name(), "Registered service");
        entries.push(Entry {
            service,
            failure: None,
        });
        Ok(())
    }

    /// Look up a service by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.service.name() == name)
            .map(|e| e.service.clone())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.service.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Status of a service. A failed start/stop overrides what the service reports.
    pub fn status(&self, name: &str) -> Result<ServiceStatus, ServiceError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .iter()
            .find(|e| e.service.name() == name)
            .ok_or_else(|| ServiceError::NotFound {
                name: name.to_string(),
            })?;
        Ok(match &entry.failure {
            Some(reason) => ServiceStatus::Failed(reason.clone()),
            None => entry.service.status(),
        })
    }

    /// `(name, status)` for every service in registration order.
    pub fn statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| {
                let status = match &e.failure {
                    Some(reason) => ServiceStatus::Failed(reason.clone()),
                    None => e.service.status(),
                };
                (e.service.name().to_string(), status)
            })
            .collect()
    }

    /// Start every service in registration order.
    ///
    /// Returns the names of services that failed to start.
    pub async fn start_all(&self) -> Vec<String> {
        let services = self.snapshot();
        if services.is_empty() {
            tracing::info!("No services to start");
            return Vec::new();
        }

        tracing::info!(count = services.len(), "Starting services");
        let mut failed = Vec::new();
        for service in services {
            let name = service.name().to_string();
            match service.start().await {
                Ok(()) => {
                    self.set_failure(&name, None);
                    tracing::info!(service = %name, "Service started");
                }
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Service failed to start");
                    self.set_failure(&name, Some(e.to_string()));
                    failed.push(name);
                }
            }
        }
        failed
    }

    /// Stop every service in reverse registration order.
    ///
    /// Returns the names of services that failed to stop.
    pub async fn stop_all(&self) -> Vec<String> {
        let services = self.snapshot();
        tracing::info!(count = services.len(), "Stopping services");
        let mut failed = Vec::new();
        for service in services.into_iter().rev() {
            let name = service.name().to_string();
            match service.stop().await {
                Ok(()) => tracing::info!(service = %name, "Service stopped"),
                Err(e) => {
                    tracing::error!(service = %name, error = %e, "Service failed to stop");
                    self.set_failure(&name, Some(e.to_string()));
                    failed.push(name);
                }
            }
        }
        failed
    }

    // Lifecycle calls await, so they run against a cloned list, never under the lock.
    fn snapshot(&self) -> Vec<Arc<dyn Service>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.service.clone())
            .collect()
    }

    fn set_failure(&self, name: &str, failure: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.iter_mut().find(|e| e.service.name() == name) {
            entry.failure = failure;
        }
    }
}

/// Read-only view of long-lived services handed to every handler invocation.
#[derive(Clone)]
pub struct ServiceView {
    resolver: Option<Arc<dyn CredentialResolver>>,
    registry: Arc<ServiceRegistry>,
}

impl ServiceView {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            resolver: None,
            registry,
        }
    }

    /// Attach the resolver handlers use to reach the original credential.
    pub fn with_credential_resolver(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The credential resolver, if one is wired in.
    pub fn credential_resolver(&self) -> Option<&Arc<dyn CredentialResolver>> {
        self.resolver.as_ref()
    }

    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.registry.get(name)
    }

    pub fn statuses(&self) -> Vec<(String, ServiceStatus)> {
        self.registry.statuses()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Recording {
        name: String,
        fail_start: bool,
        running: AtomicBool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(name: &str, fail_start: bool, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                fail_start,
                running: AtomicBool::new(false),
                log,
            })
        }
    }

    #[async_trait]
    impl Service for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        async fn start(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            if self.fail_start {
                anyhow::bail!("boom");
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("stop:{}", self.name));
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn status(&self) -> ServiceStatus {
            if self.running.load(Ordering::SeqCst) {
                ServiceStatus::Running
            } else {
                ServiceStatus::Stopped
            }
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ServiceRegistry::new();
        registry.register(Recording::new("a", false, log.clone())).unwrap();
        registry.register(Recording::new("b", false, log.clone())).unwrap();

        assert!(registry.start_all().await.is_empty());
        assert_eq!(registry.status("a").unwrap(), ServiceStatus::Running);
        assert!(registry.stop_all().await.is_empty());

        let log = log.lock().unwrap().clone();
        assert_eq!(log, vec!["start:a", "start:b", "stop:b", "stop:a"]);
    }

    #[tokio::test]
    async fn test_failed_start_does_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ServiceRegistry::new();
        registry.register(Recording::new("bad", true, log.clone())).unwrap();
        registry.register(Recording::new("good", false, log.clone())).unwrap();

        let failed = registry.start_all().await;
        assert_eq!(failed, vec!["bad".to_string()]);
        assert!(matches!(registry.status("bad").unwrap(), ServiceStatus::Failed(_)));
        assert_eq!(registry.status("good").unwrap(), ServiceStatus::Running);
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ServiceRegistry::new();
        registry.register(Recording::new("a", false, log.clone())).unwrap();
        let err = registry.register(Recording::new("a", false, log)).unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_view_lookup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = Arc::new(ServiceRegistry::new());
        registry.register(Recording::new("a", false, log)).unwrap();

        let view = ServiceView::new(registry);
        assert!(view.service("a").is_some());
        assert!(view.service("missing").is_none());
        assert!(view.credential_resolver().is_none());
        assert_eq!(view.statuses(), vec![("a".to_string(), ServiceStatus::Stopped)]);
    }
}
