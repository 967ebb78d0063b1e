//! In-memory store shared by several contexts, with change notifications and
//! failure injection for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

use crate::repository::{
    ChangeEnvelope, ChangeSubscription, ContextId, KeyValueStore, StorageChange, StorageError,
};

const CHANGE_CAPACITY: usize = 64;

/// How the shared store misbehaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    #[default]
    Healthy,
    /// `set` and `remove` return errors; reads still work.
    RejectWrites,
    /// `set` reports success but stores nothing.
    DropWritesSilently,
    /// Every call returns an error.
    Offline,
}

struct Shared {
    entries: Mutex<HashMap<String, String>>,
    failure: Mutex<FailureMode>,
    changes: broadcast::Sender<ChangeEnvelope>,
}

/// Backing store shared by every context opened from it.
#[derive(Clone)]
pub struct SharedMemoryStore {
    shared: Arc<Shared>,
}

impl Default for SharedMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                failure: Mutex::new(FailureMode::Healthy),
                changes,
            }),
        }
    }

    /// Open a new context (think: a browser tab) on this store.
    #[must_use]
    pub fn open_context(&self) -> MemoryContext {
        MemoryContext {
            id: ContextId::random(),
            store: self.clone(),
        }
    }

    pub fn set_failure_mode(&self, mode: FailureMode) {
        *self
            .shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = mode;
    }

    /// Current raw value for `key`, bypassing failure injection.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn failure(&self) -> FailureMode {
        *self
            .shared
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, origin: ContextId, change: StorageChange) {
        // No subscribers is fine.
        let _ = self.shared.changes.send(ChangeEnvelope { origin, change });
    }
}

/// One context's handle on a `SharedMemoryStore`.
#[derive(Clone)]
pub struct MemoryContext {
    id: ContextId,
    store: SharedMemoryStore,
}

impl MemoryContext {
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Subscribe to changes made by other contexts.
    #[must_use]
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(self.id, self.store.shared.changes.subscribe())
    }

    #[must_use]
    pub fn store(&self) -> &SharedMemoryStore {
        &self.store
    }
}

#[async_trait]
impl KeyValueStore for MemoryContext {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.store.failure() == FailureMode::Offline {
            return Err(StorageError::Unavailable("store offline".into()));
        }
        Ok(self.store.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self.store.failure() {
            FailureMode::Offline | FailureMode::RejectWrites => {
                Err(StorageError::Unavailable("writes rejected".into()))
            }
            FailureMode::DropWritesSilently => Ok(()),
            FailureMode::Healthy => {
                self.store.entries().insert(key.to_owned(), value.to_owned());
                self.store.publish(
                    self.id,
                    StorageChange {
                        key: key.to_owned(),
                        new_value: Some(value.to_owned()),
                    },
                );
                Ok(())
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.store.failure() {
            FailureMode::Offline | FailureMode::RejectWrites => {
                Err(StorageError::Unavailable("writes rejected".into()))
            }
            FailureMode::DropWritesSilently => Ok(()),
            FailureMode::Healthy => {
                let existed = self.store.entries().remove(key).is_some();
                if existed {
                    self.store.publish(
                        self.id,
                        StorageChange {
                            key: key.to_owned(),
                            new_value: None,
                        },
                    );
                }
                Ok(())
            }
        }
    }
}
