use std::sync::Arc;

use storage::persistence::{PersistenceAdapter, StorageStatus};
use storage::repository::KeyValueStore;
use storage::sqlite::SqliteRepository;

#[tokio::test]
async fn sqlite_store_round_trips_and_overwrites() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get("progress").await.unwrap(), None);

    repo.set("progress", r#"{"plan":["mole"]}"#).await.unwrap();
    repo.set("progress", r#"{"plan":["molar-mass"]}"#).await.unwrap();
    assert_eq!(
        repo.get("progress").await.unwrap().as_deref(),
        Some(r#"{"plan":["molar-mass"]}"#)
    );

    repo.remove("progress").await.unwrap();
    assert_eq!(repo.get("progress").await.unwrap(), None);
    repo.remove("progress").await.expect("removing a missing key is fine");
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn persistence_adapter_probes_sqlite_as_available() {
    let store = SqliteRepository::open_store("sqlite:file:memdb_kv_probe?mode=memory&cache=shared")
        .await
        .expect("open");
    let mut persistence = PersistenceAdapter::new(Arc::clone(&store), "progress");

    assert_eq!(persistence.probe().await, StorageStatus::Available);
    assert!(persistence.write("{}").await);
    assert_eq!(persistence.read().await.as_deref(), Some("{}"));
    assert_eq!(store.get("progress.__probe__").await.unwrap(), None);
}
