//! Integration tests for `BackfillController`.
//!
//! These drive a scripted archive source and the in-memory checkpoint
//! store, asserting on cursor movement, chunk boundaries, and resume
//! behavior.

use std::time::Duration;

use matchday_core::backfill::{BackfillController, BackfillStatus, CheckpointStore};
use matchday_core::model::Scope;
use matchday_core::progress::SilentReporter;
use matchday_core::{BackfillConfig, FixedClock, RatePolicy};
use tokio_util::sync::CancellationToken;

use super::common::{date, MemoryCheckpointStore, ScriptedBackfillSource};

fn clock() -> FixedClock {
    FixedClock::new("2024-11-03T14:00:00Z".parse().unwrap())
}

fn controller(
    source: &ScriptedBackfillSource,
    checkpoints: &MemoryCheckpointStore,
    chunk_days: u32,
) -> BackfillController<ScriptedBackfillSource, MemoryCheckpointStore, FixedClock> {
    BackfillController::new(
        source.clone(),
        checkpoints.clone(),
        clock(),
        BackfillConfig::default().with_chunk_days(chunk_days),
    )
}

#[tokio::test]
async fn completes_range_and_reports_totals() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    let checkpoint = controller(&source, &checkpoints, 7)
        .run(&scope, date(2023, 8, 1), date(2023, 8, 20), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(checkpoint.status, BackfillStatus::Completed);
    assert_eq!(checkpoint.cursor, date(2023, 8, 21));
    // 20 days at 2 records per day.
    assert_eq!(checkpoint.records_imported, 40);

    // Three chunks: 1-7, 8-14, 15-20.
    assert_eq!(
        source.calls(),
        vec![
            (date(2023, 8, 1), date(2023, 8, 7)),
            (date(2023, 8, 8), date(2023, 8, 14)),
            (date(2023, 8, 15), date(2023, 8, 20)),
        ]
    );
}

#[tokio::test]
async fn checkpoint_advances_only_after_each_chunk() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    controller(&source, &checkpoints, 5)
        .run(&scope, date(2023, 8, 1), date(2023, 8, 10), &SilentReporter)
        .await
        .unwrap();

    let cursors: Vec<_> = checkpoints
        .save_history()
        .into_iter()
        .map(|c| c.cursor)
        .collect();
    assert_eq!(cursors, vec![date(2023, 8, 6), date(2023, 8, 11)]);
}

#[tokio::test]
async fn failed_chunk_stops_without_advancing() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    // Chunks: 1-7, 8-14, 15-20. The second one fails.
    source.fail_once_on(date(2023, 8, 8));

    let checkpoint = controller(&source, &checkpoints, 7)
        .run(&scope, date(2023, 8, 1), date(2023, 8, 20), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(checkpoint.status, BackfillStatus::Failed);
    // Cursor still points at the failed chunk.
    assert_eq!(checkpoint.cursor, date(2023, 8, 8));
    assert_eq!(checkpoint.records_imported, 14);
    assert!(checkpoint.last_error.as_deref().unwrap().contains("2023-08-08"));

    // The third chunk was never requested.
    assert_eq!(source.calls().len(), 2);
}

#[tokio::test]
async fn resume_covers_exactly_the_remaining_dates() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");
    let from = date(2023, 8, 1);
    let to = date(2023, 8, 20);

    source.fail_once_on(date(2023, 8, 8));
    let interrupted = controller(&source, &checkpoints, 7)
        .run(&scope, from, to, &SilentReporter)
        .await
        .unwrap();
    assert_eq!(interrupted.status, BackfillStatus::Failed);

    // Second invocation resumes from the checkpoint.
    let resumed = controller(&source, &checkpoints, 7)
        .run(&scope, from, to, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(resumed.status, BackfillStatus::Completed);
    assert_eq!(resumed.cursor, date(2023, 8, 21));
    // 40 records total, exactly as an uninterrupted run would import.
    assert_eq!(resumed.records_imported, 40);

    // Dates before the failed chunk were not fetched again.
    let calls = source.calls();
    assert_eq!(
        calls,
        vec![
            (date(2023, 8, 1), date(2023, 8, 7)),
            (date(2023, 8, 8), date(2023, 8, 14)), // failed
            (date(2023, 8, 8), date(2023, 8, 14)), // retried on resume
            (date(2023, 8, 15), date(2023, 8, 20)),
        ]
    );
}

#[tokio::test]
async fn completed_backfill_is_not_rerun() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");
    let from = date(2023, 8, 1);
    let to = date(2023, 8, 3);

    controller(&source, &checkpoints, 1)
        .run(&scope, from, to, &SilentReporter)
        .await
        .unwrap();
    let first_calls = source.calls().len();

    let second = controller(&source, &checkpoints, 1)
        .run(&scope, from, to, &SilentReporter)
        .await
        .unwrap();

    assert_eq!(second.status, BackfillStatus::Completed);
    assert_eq!(source.calls().len(), first_calls);
}

#[tokio::test]
async fn different_range_starts_fresh() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    controller(&source, &checkpoints, 7)
        .run(&scope, date(2022, 8, 1), date(2022, 8, 7), &SilentReporter)
        .await
        .unwrap();

    let next = controller(&source, &checkpoints, 7)
        .run(&scope, date(2023, 8, 1), date(2023, 8, 7), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(next.start_date, date(2023, 8, 1));
    assert_eq!(next.status, BackfillStatus::Completed);
    // The new range's records only.
    assert_eq!(next.records_imported, 14);
}

#[tokio::test]
async fn empty_range_is_rejected() {
    let source = ScriptedBackfillSource::new("results-archive");
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    let result = controller(&source, &checkpoints, 7)
        .run(&scope, date(2023, 8, 2), date(2023, 8, 1), &SilentReporter)
        .await;

    assert!(result.is_err());
    assert!(source.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cooldown_separates_chunks() {
    let source = ScriptedBackfillSource::new("results-archive")
        .with_policy(RatePolicy::new(1, Duration::from_secs(60)));
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");

    let started = tokio::time::Instant::now();
    let checkpoint = controller(&source, &checkpoints, 1)
        .run(&scope, date(2023, 8, 1), date(2023, 8, 3), &SilentReporter)
        .await
        .unwrap();

    assert_eq!(checkpoint.status, BackfillStatus::Completed);
    // Three chunks, two cooldowns.
    assert!(started.elapsed() >= Duration::from_secs(120));
}

#[tokio::test]
async fn cancellation_between_chunks_persists_cancelled_status() {
    let source = ScriptedBackfillSource::new("results-archive")
        .with_policy(RatePolicy::new(1, Duration::from_secs(1)));
    let checkpoints = MemoryCheckpointStore::new();
    let scope = Scope::new("premier-league");
    let cancel = CancellationToken::new();

    let ctrl = BackfillController::new(
        source.clone(),
        checkpoints.clone(),
        clock(),
        BackfillConfig::default().with_chunk_days(1),
    )
    .with_cancellation(cancel.clone());

    // Cancel while the controller sleeps between the first and second chunk.
    let handle = tokio::spawn({
        let scope = scope.clone();
        async move {
            ctrl.run(&scope, date(2023, 8, 1), date(2023, 8, 5), &SilentReporter)
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let checkpoint = handle.await.unwrap().unwrap();
    assert_eq!(checkpoint.status, BackfillStatus::Cancelled);
    // Progress so far is durable.
    assert_eq!(checkpoint.cursor, date(2023, 8, 2));

    let stored = checkpoints
        .load("results-archive", &scope)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BackfillStatus::Cancelled);
}
