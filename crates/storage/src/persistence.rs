//! Best-effort persistence of a single key on top of a `KeyValueStore`.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::repository::KeyValueStore;

const PROBE_SUFFIX: &str = ".__probe__";
const PROBE_VALUE: &str = "1";

/// Whether writes to the underlying store are known to stick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageStatus {
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl StorageStatus {
    #[must_use]
    pub fn is_unavailable(self) -> bool {
        self == StorageStatus::Unavailable
    }
}

/// Wraps a key-value store and never propagates its failures.
///
/// Every failed write or delete flips the status to `Unavailable` and triggers
/// a probe; a successful write flips it back to `Available`.
#[derive(Clone)]
pub struct PersistenceAdapter {
    store: Arc<dyn KeyValueStore>,
    key: String,
    status: StorageStatus,
}

impl PersistenceAdapter {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            status: StorageStatus::Unknown,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn status(&self) -> StorageStatus {
        self.status
    }

    /// Read the persisted value; read failures are logged and treated as absent.
    pub async fn read(&self) -> Option<String> {
        match self.store.get(&self.key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read persisted progress");
                None
            }
        }
    }

    /// Write `value`, returning whether the store accepted and retained it.
    ///
    /// A successful `set` is confirmed by reading the key back; backends that
    /// acknowledge writes without keeping them stay `Unavailable`.
    pub async fn write(&mut self, value: &str) -> bool {
        match self.store.set(&self.key, value).await {
            Ok(()) => {
                let retained = matches!(
                    self.store.get(&self.key).await,
                    Ok(Some(stored)) if stored == value
                );
                if retained {
                    debug!(key = %self.key, bytes = value.len(), "persisted progress");
                    self.status = StorageStatus::Available;
                } else {
                    warn!(key = %self.key, "write acknowledged but not retained");
                    self.status = StorageStatus::Unavailable;
                }
                retained
            }
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to persist progress");
                self.status = StorageStatus::Unavailable;
                self.probe().await;
                false
            }
        }
    }

    /// Delete the persisted value, returning whether the store accepted it.
    pub async fn delete(&mut self) -> bool {
        match self.store.remove(&self.key).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to delete persisted progress");
                self.status = StorageStatus::Unavailable;
                false
            }
        }
    }

    /// Check that a write actually sticks by writing, reading back and removing
    /// a scratch key. Updates and returns the status.
    pub async fn probe(&mut self) -> StorageStatus {
        let probe_key = format!("{}{PROBE_SUFFIX}", self.key);
        let written = self.store.set(&probe_key, PROBE_VALUE).await.is_ok();
        let read_back = if written {
            matches!(self.store.get(&probe_key).await, Ok(Some(v)) if v == PROBE_VALUE)
        } else {
            false
        };
        let removed = self.store.remove(&probe_key).await.is_ok();

        self.status = if read_back && removed {
            StorageStatus::Available
        } else {
            warn!(key = %self.key, "storage probe failed; progress will not survive a reload");
            StorageStatus::Unavailable
        };
        self.status
    }
}
