use std::sync::Arc;
use tokio::sync::Mutex;

use storage::KeyValueStore;
use storage::sqlite::SqliteRepository;
use study_core::model::Catalog;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress::{ProgressStore, SharedStore, StoreSettings};

/// Assembles the progress store over a catalog and a storage backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<Catalog>,
    store: SharedStore,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog is invalid or storage
    /// initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        catalog_json: &str,
        settings: StoreSettings,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let catalog = Catalog::from_json(catalog_json)?;
        let kv = SqliteRepository::open_store(db_url).await?;
        Ok(Self::with_store(Arc::new(catalog), kv, settings, clock).await)
    }

    /// Build services over an already opened key-value store.
    pub async fn with_store(
        catalog: Arc<Catalog>,
        kv: Arc<dyn KeyValueStore>,
        settings: StoreSettings,
        clock: Clock,
    ) -> Self {
        let store =
            ProgressStore::initialize(Arc::clone(&catalog), kv, settings, clock).await;
        Self {
            catalog,
            store: Arc::new(Mutex::new(store)),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }
}
