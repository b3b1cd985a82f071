//! Progress reporting for sync runs and backfills.
//!
//! Core logic emits [`SyncEvent`]s through a [`SyncReporter`] instead of
//! logging directly, so the CLI can render progress while tests run silent
//! and assert on captured events.

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::model::{PhaseOutcome, Scope, SyncPhase};

// =============================================================================
// Sync Events
// =============================================================================

/// Events emitted during one orchestrator run or backfill.
#[derive(Debug, Clone)]
pub enum SyncEvent<'a> {
    /// An orchestrator run started.
    RunStarted { run_id: Uuid, forced_full_sync: bool },
    /// A phase is about to execute its work units.
    PhaseStarted {
        run_id: Uuid,
        phase: SyncPhase,
        units: usize,
    },
    /// A phase executed no units and was skipped.
    PhaseSkipped { run_id: Uuid, phase: SyncPhase },
    /// A phase finished executing.
    PhaseCompleted {
        run_id: Uuid,
        phase: SyncPhase,
        outcome: &'a PhaseOutcome,
    },
    /// One work unit failed; the run continues.
    UnitFailed {
        run_id: Uuid,
        phase: SyncPhase,
        scope: &'a Scope,
        error: &'a str,
    },
    /// The run finished (possibly early, on cancellation).
    RunCompleted {
        run_id: Uuid,
        total_units: usize,
        total_failed: usize,
        cancelled: bool,
    },
    /// A backfill chunk completed and the checkpoint advanced.
    BackfillChunkCompleted {
        provider: &'a str,
        scope: &'a Scope,
        from: NaiveDate,
        to: NaiveDate,
        records: usize,
    },
    /// A backfill chunk failed; the checkpoint did not advance.
    BackfillChunkFailed {
        provider: &'a str,
        scope: &'a Scope,
        from: NaiveDate,
        error: &'a str,
    },
}

// =============================================================================
// Sync Reporter Trait
// =============================================================================

/// Trait for reporting sync progress events.
pub trait SyncReporter: Send + Sync {
    /// Called when a sync event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SyncEvent<'_>) {
        let _ = event;
    }
}

/// Silent reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl SyncReporter for SilentReporter {}

/// Tracing-based reporter for CLI logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl SyncReporter for TracingReporter {
    fn report(&self, event: SyncEvent<'_>) {
        match event {
            SyncEvent::RunStarted {
                run_id,
                forced_full_sync,
            } => {
                info!(%run_id, forced_full_sync, "Sync run started");
            }
            SyncEvent::PhaseStarted {
                run_id,
                phase,
                units,
            } => {
                info!(%run_id, phase = %phase, units, "Phase started");
            }
            SyncEvent::PhaseSkipped { run_id, phase } => {
                info!(%run_id, phase = %phase, "Phase skipped: nothing to do");
            }
            SyncEvent::PhaseCompleted {
                run_id,
                phase,
                outcome,
            } => {
                info!(
                    %run_id,
                    phase = %phase,
                    attempted = outcome.attempted,
                    succeeded = outcome.succeeded,
                    failed = outcome.failed,
                    flagged = outcome.flagged.len(),
                    "Phase completed"
                );
            }
            SyncEvent::UnitFailed {
                run_id,
                phase,
                scope,
                error,
            } => {
                tracing::warn!(%run_id, phase = %phase, scope = %scope, error, "Work unit failed");
            }
            SyncEvent::RunCompleted {
                run_id,
                total_units,
                total_failed,
                cancelled,
            } => {
                info!(
                    %run_id,
                    total_units,
                    total_failed,
                    cancelled,
                    "Sync run completed"
                );
            }
            SyncEvent::BackfillChunkCompleted {
                provider,
                scope,
                from,
                to,
                records,
            } => {
                info!(provider, scope = %scope, %from, %to, records, "Backfill chunk completed");
            }
            SyncEvent::BackfillChunkFailed {
                provider,
                scope,
                from,
                error,
            } => {
                tracing::warn!(provider, scope = %scope, %from, error, "Backfill chunk failed");
            }
        }
    }
}
