mod common;

use common::CATALOG_JSON;
use services::{AppServices, AppServicesError, StoreSettings};
use storage::StorageStatus;
use study_core::time::manual_clock;

const DB_URL: &str = "sqlite:file:memdb_app_services?mode=memory&cache=shared";

#[tokio::test]
async fn progress_survives_a_restart_on_sqlite() {
    let clock = manual_clock();
    let first = AppServices::new_sqlite(DB_URL, CATALOG_JSON, StoreSettings::default(), clock.clone())
        .await
        .expect("first launch");
    {
        let store = first.store();
        let mut store = store.lock().await;
        assert_eq!(store.storage_status(), StorageStatus::Available);
        store.record_answer("mm-d1", 1).unwrap();
        store.set_auto_next(true);
        assert_eq!(store.flush_now().await, Some(true));
    }

    let second = AppServices::new_sqlite(DB_URL, CATALOG_JSON, StoreSettings::default(), clock)
        .await
        .expect("second launch");
    let store = second.store();
    let store = store.lock().await;
    assert_eq!(store.answers().get("mm-d1"), Some(1));
    assert!(store.record().auto_next);
    assert_eq!(second.catalog().topics().len(), 2);
    drop(first);
}

#[tokio::test]
async fn invalid_catalog_is_rejected() {
    let result = AppServices::new_sqlite(
        "sqlite:file:memdb_app_bad_catalog?mode=memory&cache=shared",
        r#"{"topics":[{"id":"t","name":"T","diagnostic":[{"id":"q","prompt":"?","choices":[],"correct":0}]}]}"#,
        StoreSettings::default(),
        manual_clock(),
    )
    .await;
    assert!(matches!(result, Err(AppServicesError::Catalog(_))));
}
