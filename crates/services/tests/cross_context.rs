mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{KEY, open, open_tab};
use services::ExternalOutcome;
use storage::{KeyValueStore, SharedMemoryStore, StorageChange};
use study_core::model::ProgressRecord;
use study_core::time::manual_clock;

fn flush_window() -> Duration {
    Duration::milliseconds(250)
}

fn change(value: Option<&str>) -> StorageChange {
    StorageChange {
        key: KEY.into(),
        new_value: value.map(str::to_owned),
    }
}

#[tokio::test]
async fn other_tab_write_is_adopted_without_writing_back() {
    let clock = manual_clock();
    let memory = SharedMemoryStore::new();
    let mut tab_a = open_tab(&memory, &clock).await;

    let context_b = memory.open_context();
    let mut changes_b = context_b.subscribe();
    let mut tab_b = open(Arc::new(context_b), &clock).await;

    tab_a.record_answer("mole-d1", 0).unwrap();
    tab_a.set_auto_next(true);
    clock.advance(flush_window());
    assert_eq!(tab_a.tick().await.flushed, Some(true));
    let written = memory.peek(KEY).unwrap();

    let incoming = changes_b.try_recv().unwrap();
    assert_eq!(incoming, change(Some(&written)));
    assert_eq!(tab_b.apply_external_change(&incoming), ExternalOutcome::Adopted);
    assert_eq!(tab_b.answers(), tab_a.answers());
    assert!(tab_b.record().auto_next);
    assert_eq!(tab_b.record().saved_at, tab_a.record().saved_at);
    assert!(!tab_b.has_pending_flush());

    clock.advance(Duration::seconds(1));
    assert_eq!(tab_b.tick().await.flushed, None);
    assert_eq!(memory.peek(KEY).unwrap(), written);
    assert_eq!(changes_b.try_recv(), None);
}

#[tokio::test]
async fn later_local_edits_after_adoption_persist_normally() {
    let clock = manual_clock();
    let memory = SharedMemoryStore::new();
    let mut tab = open_tab(&memory, &clock).await;

    let outcome = tab.apply_external_change(&change(Some(r#"{"answers":{"mole-d1":1}}"#)));
    assert_eq!(outcome, ExternalOutcome::Adopted);

    tab.record_answer("mole-d2", 0).unwrap();
    clock.advance(flush_window());
    assert_eq!(tab.tick().await.flushed, Some(true));
    let saved = ProgressRecord::from_persisted_json(&memory.peek(KEY).unwrap()).unwrap();
    assert_eq!(saved.answers.len(), 2);
}

#[tokio::test]
async fn garbage_from_another_tab_is_ignored() {
    let clock = manual_clock();
    let mut tab = open_tab(&SharedMemoryStore::new(), &clock).await;
    tab.record_answer("mole-d1", 0).unwrap();
    let before = tab.record().clone();

    for raw in ["{not json", "42", r#"{"answers":[1,2]}"#] {
        assert_eq!(
            tab.apply_external_change(&change(Some(raw))),
            ExternalOutcome::Ignored
        );
    }
    assert_eq!(tab.record(), &before);
    assert!(tab.has_pending_flush());
}

#[tokio::test]
async fn changes_to_other_keys_are_ignored() {
    let clock = manual_clock();
    let mut tab = open_tab(&SharedMemoryStore::new(), &clock).await;
    let other = StorageChange {
        key: format!("{KEY}.__probe__"),
        new_value: Some("1".into()),
    };
    assert_eq!(tab.apply_external_change(&other), ExternalOutcome::Ignored);
}

#[tokio::test]
async fn deletion_in_another_tab_resets_this_one() {
    let clock = manual_clock();
    let memory = SharedMemoryStore::new();
    let mut tab_a = open_tab(&memory, &clock).await;
    let context_b = memory.open_context();
    let mut changes_b = context_b.subscribe();
    let mut tab_b = open(Arc::new(context_b), &clock).await;

    tab_a.record_answer("mole-d1", 0).unwrap();
    clock.advance(flush_window());
    tab_a.tick().await;
    let written = changes_b.try_recv().unwrap();
    tab_b.apply_external_change(&written);
    tab_b.record_answer("mole-d2", 0).unwrap();

    assert!(tab_a.reset_all().await);
    let deleted = changes_b.try_recv().unwrap();
    assert_eq!(deleted, change(None));
    assert_eq!(tab_b.apply_external_change(&deleted), ExternalOutcome::Reset);
    assert_eq!(tab_b.record(), &ProgressRecord::default());

    // Tab B's pending edit must not bring the record back.
    clock.advance(Duration::seconds(1));
    assert_eq!(tab_b.tick().await.flushed, None);
    assert_eq!(memory.peek(KEY), None);
}

#[tokio::test]
async fn adopted_records_are_clamped_and_pruned() {
    let clock = manual_clock();
    let mut tab = open_tab(&SharedMemoryStore::new(), &clock).await;
    let raw = r#"{"plan":["mole","acids"],"dayIndex":5,"answers":{"mole-d1":0,"mole-d2":9},"dayProgress":{"1":{"conceptDone":true,"practiceDone":false}}}"#;

    assert_eq!(
        tab.apply_external_change(&change(Some(raw))),
        ExternalOutcome::Adopted
    );
    let record = tab.record();
    assert_eq!(record.plan.len(), 1);
    assert_eq!(record.day_index, 0);
    assert_eq!(record.answers.len(), 1);
    assert!(record.day_progress.is_empty());
}

#[tokio::test]
async fn a_third_context_can_read_what_was_adopted() {
    let clock = manual_clock();
    let memory = SharedMemoryStore::new();
    let mut tab = open_tab(&memory, &clock).await;
    tab.set_shuffle_practice(true);
    assert_eq!(tab.flush_now().await, Some(true));

    let reader = memory.open_context();
    let raw = reader.get(KEY).await.unwrap().unwrap();
    assert!(ProgressRecord::from_persisted_json(&raw).unwrap().shuffle_practice);
}
