use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Durable string key-value store.
///
/// Implementations may fail on any call, and some backends drop writes without
/// reporting an error, so callers probe writability separately from use.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write is rejected.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the delete is rejected.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Identifies one execution context (a window, tab or process) sharing a store.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({})", self.0)
    }
}

/// A key written or deleted by some context; `new_value` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub new_value: Option<String>,
}

/// A change tagged with the context that made it.
#[derive(Debug, Clone)]
pub struct ChangeEnvelope {
    pub origin: ContextId,
    pub change: StorageChange,
}

/// Receives changes made by *other* contexts sharing the same store.
///
/// Changes made by the subscribing context itself are filtered out, matching
/// how a browser only fires storage events in the tabs that did not write.
pub struct ChangeSubscription {
    origin: ContextId,
    rx: broadcast::Receiver<ChangeEnvelope>,
}

impl ChangeSubscription {
    #[must_use]
    pub fn new(origin: ContextId, rx: broadcast::Receiver<ChangeEnvelope>) -> Self {
        Self { origin, rx }
    }

    /// Wait for the next foreign change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.origin => {}
                Ok(envelope) => return Some(envelope.change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "storage change subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if envelope.origin == self.origin => {}
                Ok(envelope) => return Some(envelope.change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "storage change subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
