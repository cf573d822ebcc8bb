//! Per-invocation context handed to tool handlers.

use crate::protocol::{JsonRpcNotification, LogLevel, LoggingMessage};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use warden_core::SessionId;

/// Read-only context of one dispatch.
///
/// Built fresh for every call and never shared between invocations.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub session_id: SessionId,
    pub request_id: Value,
    /// Raw request metadata (transport headers, client address).
    pub metadata: BTreeMap<String, String>,
    pub notifier: Notifier,
}

impl InvocationContext {
    pub fn new(session_id: SessionId, request_id: Value, notifier: Notifier) -> Self {
        Self {
            session_id,
            request_id,
            metadata: BTreeMap::new(),
            notifier,
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sends notifications correlated to one request.
///
/// The dispatcher closes the notifier before the final result is produced;
/// anything sent afterwards is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    request_id: Value,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<JsonRpcNotification>>>>,
}

impl Notifier {
    pub fn new(request_id: Value, tx: mpsc::UnboundedSender<JsonRpcNotification>) -> Self {
        Self {
            request_id,
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// A notifier with no listener; every send is dropped.
    pub fn disconnected(request_id: Value) -> Self {
        Self {
            request_id,
            tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Emit a `notifications/message` log entry. Returns whether it was queued.
    pub fn log(&self, level: LogLevel, logger: &str, data: impl Into<Value>) -> bool {
        let params = LoggingMessage {
            level,
            logger: Some(logger.to_string()),
            data: data.into(),
            related_request_id: Some(self.request_id.clone()),
        };
        let params = match serde_json::to_value(params) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode log notification");
                return false;
            }
        };
        self.send(JsonRpcNotification::new("notifications/message", params))
    }

    /// Queue an arbitrary notification. Returns whether it was queued.
    pub fn send(&self, notification: JsonRpcNotification) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx.send(notification).is_ok(),
            None => {
                tracing::debug!(request_id = %self.request_id, "Notification after close dropped");
                false
            }
        }
    }

    pub fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|tx| tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_notifications_stop_after_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(json!(7), tx);

        assert!(notifier.log(LogLevel::Info, "test", "first"));
        notifier.close();
        assert!(notifier.is_closed());
        assert!(!notifier.log(LogLevel::Info, "test", "late"));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.method, "notifications/message");
        let params = first.params.unwrap();
        assert_eq!(params["data"], "first");
        assert_eq!(params["relatedRequestId"], 7);
        // The sender was dropped on close.
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_disconnected_notifier() {
        let notifier = Notifier::disconnected(json!("a"));
        assert!(notifier.is_closed());
        assert!(!notifier.log(LogLevel::Debug, "test", "dropped"));
    }
}
