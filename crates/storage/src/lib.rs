#![forbid(unsafe_code)]

pub mod memory;
pub mod persistence;
pub mod repository;
pub mod sqlite;

pub use memory::{FailureMode, MemoryContext, SharedMemoryStore};
pub use persistence::{PersistenceAdapter, StorageStatus};
pub use repository::{ChangeSubscription, ContextId, KeyValueStore, StorageChange, StorageError};
