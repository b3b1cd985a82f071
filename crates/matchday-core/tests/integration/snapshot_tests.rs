//! Tests for the snapshot store contract, exercised through the in-memory
//! implementation. matchday-db runs the same assertions against PostgreSQL.

use matchday_core::model::Scope;
use matchday_core::snapshot::{NewSnapshot, SnapshotStore};

use super::common::{date, MemorySnapshotStore};

fn standing(scope: &Scope, day: chrono::NaiveDate, position: i64) -> NewSnapshot {
    NewSnapshot::new(
        "team:arsenal",
        scope.clone(),
        day,
        serde_json::json!({"position": position}),
        "standings",
    )
}

#[tokio::test]
async fn upsert_same_key_replaces_instead_of_duplicating() {
    let store = MemorySnapshotStore::new();
    let scope = Scope::new("premier-league");
    let day = date(2024, 11, 3);

    store.upsert(standing(&scope, day, 4)).await.unwrap();
    let second = store.upsert(standing(&scope, day, 2)).await.unwrap();

    assert_eq!(store.version_count(), 1);
    assert_eq!(second.payload["position"], 2);

    let read = store.get_as_of("team:arsenal", &scope, day).await.unwrap();
    assert_eq!(read.unwrap().payload["position"], 2);
}

#[tokio::test]
async fn as_of_returns_newest_version_at_or_before_date() {
    let store = MemorySnapshotStore::new();
    let scope = Scope::new("premier-league");

    store.upsert(standing(&scope, date(2024, 11, 1), 5)).await.unwrap();
    store.upsert(standing(&scope, date(2024, 11, 8), 3)).await.unwrap();
    store.upsert(standing(&scope, date(2024, 11, 15), 1)).await.unwrap();

    // Exact hit.
    let on_the_8th = store
        .get_as_of("team:arsenal", &scope, date(2024, 11, 8))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(on_the_8th.payload["position"], 3);

    // Between versions: the older one wins.
    let on_the_10th = store
        .get_as_of("team:arsenal", &scope, date(2024, 11, 10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(on_the_10th.logical_date, date(2024, 11, 8));
}

#[tokio::test]
async fn as_of_never_leaks_future_versions() {
    let store = MemorySnapshotStore::new();
    let scope = Scope::new("premier-league");

    store.upsert(standing(&scope, date(2024, 11, 8), 3)).await.unwrap();

    let before = store
        .get_as_of("team:arsenal", &scope, date(2024, 11, 7))
        .await
        .unwrap();
    assert!(before.is_none());
}

#[tokio::test]
async fn same_entity_in_other_scope_is_invisible() {
    let store = MemorySnapshotStore::new();
    let premier = Scope::new("premier-league");
    let cup = Scope::new("fa-cup");

    store.upsert(standing(&premier, date(2024, 11, 8), 3)).await.unwrap();

    let read = store
        .get_as_of("team:arsenal", &cup, date(2024, 11, 8))
        .await
        .unwrap();
    assert!(read.is_none());
}

#[tokio::test]
async fn history_is_ordered_oldest_first() {
    let store = MemorySnapshotStore::new();
    let scope = Scope::new("premier-league");

    store.upsert(standing(&scope, date(2024, 11, 15), 1)).await.unwrap();
    store.upsert(standing(&scope, date(2024, 11, 1), 5)).await.unwrap();
    store.upsert(standing(&scope, date(2024, 11, 8), 3)).await.unwrap();

    let history = store.history("team:arsenal", &scope).await.unwrap();
    let dates: Vec<_> = history.iter().map(|s| s.logical_date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 11, 1), date(2024, 11, 8), date(2024, 11, 15)]
    );
}

#[tokio::test]
async fn prune_removes_only_strictly_older_versions_in_scope() {
    let store = MemorySnapshotStore::new();
    let premier = Scope::new("premier-league");
    let cup = Scope::new("fa-cup");

    store.upsert(standing(&premier, date(2024, 9, 1), 8)).await.unwrap();
    store.upsert(standing(&premier, date(2024, 11, 1), 5)).await.unwrap();
    store.upsert(standing(&cup, date(2024, 9, 1), 2)).await.unwrap();

    let deleted = store.prune_before(&premier, date(2024, 11, 1)).await.unwrap();
    assert_eq!(deleted, 1);

    // The cutoff version itself and the other scope survive.
    assert!(store
        .get_as_of("team:arsenal", &premier, date(2024, 11, 1))
        .await
        .unwrap()
        .is_some());
    assert!(store
        .get_as_of("team:arsenal", &cup, date(2024, 9, 1))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn upsert_many_reports_written_count() {
    let store = MemorySnapshotStore::new();
    let scope = Scope::new("premier-league");

    let batch = vec![
        standing(&scope, date(2024, 11, 1), 5),
        standing(&scope, date(2024, 11, 8), 3),
        // Same key as the first entry: replaces, still counts as written.
        standing(&scope, date(2024, 11, 1), 6),
    ];
    let written = store.upsert_many(batch).await.unwrap();

    assert_eq!(written, 3);
    assert_eq!(store.version_count(), 2);
}
