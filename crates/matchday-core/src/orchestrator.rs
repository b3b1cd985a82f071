//! Three-phase sync orchestration.
//!
//! One orchestrator run walks a fixed phase sequence and lets each phase's
//! observations decide whether the next phase has anything to do:
//!
//! 1. **Results** — refresh match results for every tracked scope,
//!    unconditionally.
//! 2. **Derived data** — refresh standings and ratings, but only for scopes
//!    whose results phase reported newly finished matches. Once per day, at
//!    the configured forced-full-sync hour, every scope is refreshed
//!    regardless.
//! 3. **Structural data** — refresh rosters, but only for scopes whose
//!    derived phase observed a season rollover.
//!
//! On a quiet day the run touches phase 1 and goes back to idle. A phase
//! with no work is skipped entirely, including its provider's cooldowns.
//!
//! Failures are contained: a failed work unit is logged, counted against the
//! provider's health, and simply contributes no change signal. The run never
//! aborts because one scope failed, and nothing is retried within the run.
//!
//! # Type Parameters
//!
//! The orchestrator is generic over its three provider adapters, the
//! snapshot store (used here only for season markers; adapters write their
//! own payloads), and the clock:
//!
//! ```ignore
//! let orchestrator = SyncOrchestrator::new(
//!     results_adapter,
//!     standings_adapter,
//!     roster_adapter,
//!     snapshot_repo,
//!     SystemClock,
//!     OrchestratorConfig::default(),
//!     scopes,
//! );
//! let report = orchestrator.run(&TracingReporter).await?;
//! ```

use std::collections::BTreeMap;

use chrono::Timelike;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::batch::BatchExecutor;
use crate::clock::Clock;
use crate::config::OrchestratorConfig;
use crate::error::AppError;
use crate::health::HealthTracker;
use crate::model::{FetchReport, PhaseOutcome, Scope, SeasonMarker, SyncPhase, SyncRunReport};
use crate::progress::{SyncEvent, SyncReporter};
use crate::provider::ProviderAdapter;
use crate::season::is_new_season;
use crate::snapshot::SnapshotStore;

/// What one phase left behind: its counters plus the per-scope reports of
/// the units that succeeded.
struct PhaseResult {
    outcome: PhaseOutcome,
    reports: Vec<(Scope, FetchReport)>,
    cancelled: bool,
}

impl PhaseResult {
    fn skipped() -> Self {
        Self {
            outcome: PhaseOutcome::default(),
            reports: Vec::new(),
            cancelled: false,
        }
    }
}

/// Orchestrates the phased sync across three provider integrations.
///
/// # Type Parameters
///
/// * `R` - Results provider adapter (phase 1)
/// * `D` - Derived-data provider adapter (phase 2)
/// * `T` - Structural-data provider adapter (phase 3)
/// * `S` - Snapshot store, used for season markers
/// * `C` - Clock
pub struct SyncOrchestrator<R, D, T, S, C>
where
    R: ProviderAdapter,
    D: ProviderAdapter,
    T: ProviderAdapter,
    S: SnapshotStore,
    C: Clock,
{
    results: R,
    derived: D,
    structural: T,
    store: S,
    clock: C,
    config: OrchestratorConfig,
    scopes: Vec<Scope>,
    health: HealthTracker<C>,
    cancel: CancellationToken,
}

impl<R, D, T, S, C> Clone for SyncOrchestrator<R, D, T, S, C>
where
    R: ProviderAdapter,
    D: ProviderAdapter,
    T: ProviderAdapter,
    S: SnapshotStore,
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
            derived: self.derived.clone(),
            structural: self.structural.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            scopes: self.scopes.clone(),
            health: self.health.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<R, D, T, S, C> SyncOrchestrator<R, D, T, S, C>
where
    R: ProviderAdapter,
    D: ProviderAdapter,
    T: ProviderAdapter,
    S: SnapshotStore,
    C: Clock,
{
    pub fn new(
        results: R,
        derived: D,
        structural: T,
        store: S,
        clock: C,
        config: OrchestratorConfig,
        scopes: Vec<Scope>,
    ) -> Self {
        let health = HealthTracker::new(clock.clone());
        health.register(results.name(), results.stale_after());
        health.register(derived.name(), derived.stale_after());
        health.register(structural.name(), structural.stale_after());

        Self {
            results,
            derived,
            structural,
            store,
            clock,
            config,
            scopes,
            health,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token. A cancelled run finishes its in-flight
    /// batch, skips the rest, and reports `cancelled = true`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The shared health tracker for this orchestrator's providers.
    pub fn health(&self) -> &HealthTracker<C> {
        &self.health
    }

    /// Executes one full run: results, then the conditional phases.
    pub async fn run<RP: SyncReporter>(&self, reporter: &RP) -> Result<SyncRunReport, AppError> {
        let run_id = Uuid::new_v4();
        let started_at = self.clock.now();
        let forced_full_sync = self.config.forced_full_sync_hour == Some(started_at.hour());

        reporter.report(SyncEvent::RunStarted {
            run_id,
            forced_full_sync,
        });

        // Phase 1: results, every tracked scope.
        let phase1 = self
            .execute_phase(
                run_id,
                SyncPhase::Results,
                &self.results,
                self.scopes.clone(),
                reporter,
            )
            .await;
        let mut cancelled = phase1.cancelled;

        // Scopes that warrant a derived-data refresh: those with newly
        // finished matches, or all of them during the forced hour.
        let changed_scopes: Vec<Scope> = if cancelled {
            Vec::new()
        } else if forced_full_sync {
            self.scopes.clone()
        } else {
            phase1
                .reports
                .iter()
                .filter(|(_, report)| report.newly_finished)
                .map(|(scope, _)| scope.clone())
                .collect()
        };

        let phase2 = if changed_scopes.is_empty() {
            if !cancelled {
                reporter.report(SyncEvent::PhaseSkipped {
                    run_id,
                    phase: SyncPhase::DerivedData,
                });
            }
            PhaseResult::skipped()
        } else {
            if !phase1.outcome.is_empty() {
                cancelled = self.phase_cooldown().await || cancelled;
            }
            if cancelled {
                PhaseResult::skipped()
            } else {
                self.execute_phase(
                    run_id,
                    SyncPhase::DerivedData,
                    &self.derived,
                    changed_scopes,
                    reporter,
                )
                .await
            }
        };
        cancelled = cancelled || phase2.cancelled;

        // Scopes whose derived data announced a new season.
        let rollovers = if cancelled {
            Vec::new()
        } else {
            self.detect_rollovers(&phase2.reports).await
        };
        let rollover_scopes: Vec<Scope> =
            rollovers.iter().map(|(scope, _)| scope.clone()).collect();

        let phase3 = if rollover_scopes.is_empty() {
            if !cancelled {
                reporter.report(SyncEvent::PhaseSkipped {
                    run_id,
                    phase: SyncPhase::StructuralData,
                });
            }
            PhaseResult::skipped()
        } else {
            if !phase2.outcome.is_empty() {
                cancelled = self.phase_cooldown().await || cancelled;
            }
            if cancelled {
                PhaseResult::skipped()
            } else {
                self.execute_phase(
                    run_id,
                    SyncPhase::StructuralData,
                    &self.structural,
                    rollover_scopes,
                    reporter,
                )
                .await
            }
        };
        cancelled = cancelled || phase3.cancelled;

        // Markers are recorded only once the scope's structural refresh went
        // through, so a failed roster fetch leaves the old marker in place
        // and the next run re-detects the rollover and retries.
        for (scope, observed) in &rollovers {
            if !phase3.reports.iter().any(|(s, _)| s == scope) {
                continue;
            }
            if let Err(error) = self.store.record_season(scope, observed).await {
                tracing::warn!(scope = %scope, error = %error, "Season record failed");
            }
        }

        let report = SyncRunReport {
            run_id,
            started_at,
            finished_at: self.clock.now(),
            forced_full_sync,
            cancelled,
            results: phase1.outcome,
            derived_data: phase2.outcome,
            structural_data: phase3.outcome,
        };

        reporter.report(SyncEvent::RunCompleted {
            run_id,
            total_units: report.total_units(),
            total_failed: report.total_failed(),
            cancelled,
        });

        Ok(report)
    }

    /// Executes phase 1 alone. Used by the manual `sync --results-only`
    /// trigger; no conditional phases follow.
    pub async fn run_results_only<RP: SyncReporter>(&self, reporter: &RP) -> PhaseOutcome {
        let run_id = Uuid::new_v4();
        reporter.report(SyncEvent::RunStarted {
            run_id,
            forced_full_sync: false,
        });
        let phase = self
            .execute_phase(
                run_id,
                SyncPhase::Results,
                &self.results,
                self.scopes.clone(),
                reporter,
            )
            .await;
        reporter.report(SyncEvent::RunCompleted {
            run_id,
            total_units: phase.outcome.attempted,
            total_failed: phase.outcome.failed,
            cancelled: phase.cancelled,
        });
        phase.outcome
    }

    /// Runs one phase's scopes through the batch executor under the
    /// adapter's rate policy, folding outcomes into health.
    async fn execute_phase<A, RP>(
        &self,
        run_id: Uuid,
        phase: SyncPhase,
        adapter: &A,
        scopes: Vec<Scope>,
        reporter: &RP,
    ) -> PhaseResult
    where
        A: ProviderAdapter,
        RP: SyncReporter,
    {
        if !self.health.is_enabled(adapter.name()) {
            tracing::info!(
                provider = adapter.name(),
                phase = %phase,
                "Provider disabled; phase skipped"
            );
            reporter.report(SyncEvent::PhaseSkipped { run_id, phase });
            return PhaseResult::skipped();
        }

        reporter.report(SyncEvent::PhaseStarted {
            run_id,
            phase,
            units: scopes.len(),
        });

        let executor =
            BatchExecutor::new(adapter.rate_policy()).with_cancellation(self.cancel.clone());
        let run = executor
            .execute(scopes, |scope| {
                let adapter = adapter.clone();
                async move { adapter.fetch(&scope).await }
            })
            .await;

        let mut outcome = PhaseOutcome {
            attempted: run.outcomes.len(),
            ..PhaseOutcome::default()
        };
        let mut reports = Vec::new();

        for unit in run.outcomes {
            match unit.result {
                Ok(report) => {
                    outcome.succeeded += 1;
                    self.health.record_success(adapter.name(), unit.duration);
                    if report.newly_finished {
                        outcome.flagged.push(unit.unit.clone());
                    }
                    reports.push((unit.unit, report));
                }
                Err(error) => {
                    outcome.failed += 1;
                    let message = error.to_string();
                    if error.counts_toward_health() {
                        self.health.record_failure(adapter.name(), &message);
                    } else {
                        tracing::warn!(
                            provider = adapter.name(),
                            scope = %unit.unit,
                            error = %message,
                            "Work unit skipped"
                        );
                    }
                    reporter.report(SyncEvent::UnitFailed {
                        run_id,
                        phase,
                        scope: &unit.unit,
                        error: &message,
                    });
                }
            }
        }

        reporter.report(SyncEvent::PhaseCompleted {
            run_id,
            phase,
            outcome: &outcome,
        });

        PhaseResult {
            outcome,
            reports,
            cancelled: run.cancelled,
        }
    }

    /// Compares observed season markers against the recorded ones. Returns
    /// each rolled-over scope with its observed marker, ordered by scope.
    /// Nothing is recorded here; markers are written after the structural
    /// refresh succeeds.
    ///
    /// A store error while checking one scope is logged and treated as "no
    /// rollover"; the next run will see the same marker again.
    async fn detect_rollovers(
        &self,
        reports: &[(Scope, FetchReport)],
    ) -> Vec<(Scope, SeasonMarker)> {
        let mut rolled: BTreeMap<Scope, SeasonMarker> = BTreeMap::new();

        for (scope, report) in reports {
            let Some(observed) = &report.observed_season else {
                continue;
            };
            if rolled.contains_key(scope) {
                continue;
            }

            let recorded = match self.store.current_season(scope).await {
                Ok(recorded) => recorded,
                Err(error) => {
                    tracing::warn!(scope = %scope, error = %error, "Season lookup failed");
                    continue;
                }
            };

            if is_new_season(recorded.as_ref(), observed) {
                tracing::info!(
                    scope = %scope,
                    season = %observed.id,
                    "Season rollover detected"
                );
                rolled.insert(scope.clone(), observed.clone());
            }
        }

        rolled.into_iter().collect()
    }

    /// Sleeps the configured pause between two work-executing phases.
    /// Returns true if cancellation fired during the sleep.
    async fn phase_cooldown(&self) -> bool {
        if self.config.phase_cooldown.is_zero() {
            return self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.phase_cooldown) => false,
            _ = self.cancel.cancelled() => true,
        }
    }
}
