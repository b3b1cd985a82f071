//! Fixed-cadence scheduling of sync runs.
//!
//! The scheduler runs the orchestrator once per interval. Overlap is
//! prevented structurally: each run is awaited to completion before the
//! next sleep starts, so at most one run is ever in flight. A run that
//! outlasts the interval simply delays the next one; no run is skipped or
//! queued.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::AppError;
use crate::orchestrator::SyncOrchestrator;
use crate::progress::SyncReporter;
use crate::provider::ProviderAdapter;
use crate::snapshot::SnapshotStore;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Pause between the end of one run and the start of the next.
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
        }
    }
}

/// Runs the orchestrator on a fixed cadence until cancelled.
pub struct Scheduler<R, D, T, S, C>
where
    R: ProviderAdapter,
    D: ProviderAdapter,
    T: ProviderAdapter,
    S: SnapshotStore,
    C: Clock,
{
    orchestrator: SyncOrchestrator<R, D, T, S, C>,
    config: SchedulerConfig,
}

impl<R, D, T, S, C> Scheduler<R, D, T, S, C>
where
    R: ProviderAdapter,
    D: ProviderAdapter,
    T: ProviderAdapter,
    S: SnapshotStore,
    C: Clock,
{
    pub fn new(orchestrator: SyncOrchestrator<R, D, T, S, C>, config: SchedulerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Runs until the token is cancelled. The first run starts immediately.
    ///
    /// A run that returns an error (checkpoint or store trouble, not unit
    /// failures) is logged and the cadence continues; the scheduler itself
    /// only stops on cancellation.
    pub async fn run<RP: SyncReporter>(
        &self,
        cancel: CancellationToken,
        reporter: &RP,
    ) -> Result<(), AppError> {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Awaiting the run inline is the overlap guard: the next sleep
            // cannot start until this run has fully finished.
            match self.orchestrator.run(reporter).await {
                Ok(report) => {
                    if report.cancelled {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Sync run failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
