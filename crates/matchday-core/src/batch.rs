//! Rate-limited batch execution.
//!
//! Every provider call in the system — orchestrator phases and backfill
//! chunks alike — goes through a [`BatchExecutor`]. The executor splits the
//! pending work units into batches no larger than the provider's
//! `batch_size`, runs one batch concurrently, then sleeps for the provider's
//! `cooldown` before starting the next batch. The cooldown is observed even
//! when every call in the batch failed; failures do not buy extra calls.
//!
//! The executor never retries. A failed unit is reported in its
//! [`UnitOutcome`] and picked up again on the next scheduled run.
//!
//! # Cancellation
//!
//! A [`CancellationToken`] can interrupt the run between batches and during
//! cooldown sleeps. In-flight calls of the current batch are allowed to
//! complete; no new batch starts after cancellation.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::config::RatePolicy;
use crate::error::AppError;

/// The result of executing one work unit, with the time the call took.
#[derive(Debug)]
pub struct UnitOutcome<U, R> {
    /// The unit that was executed.
    pub unit: U,
    /// What the call returned.
    pub result: Result<R, AppError>,
    /// Wall time of the call itself, excluding queueing and cooldowns.
    pub duration: Duration,
}

impl<U, R> UnitOutcome<U, R> {
    /// True if the call returned Ok.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of one executor run.
#[derive(Debug)]
pub struct BatchRun<U, R> {
    /// Outcomes of all units that were actually executed, in completion
    /// order within each batch.
    pub outcomes: Vec<UnitOutcome<U, R>>,
    /// True if cancellation stopped the run before all units executed.
    pub cancelled: bool,
}

impl<U, R> BatchRun<U, R> {
    /// Number of units whose call returned Ok.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of units whose call returned Err.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Executes work units in rate-limited batches.
///
/// Generic over the unit type so the same executor drives orchestrator
/// phases (units are scopes) and anything else that must respect a
/// provider's [`RatePolicy`].
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    policy: RatePolicy,
    cancel: CancellationToken,
}

impl BatchExecutor {
    /// Creates an executor for the given rate policy.
    pub fn new(policy: RatePolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token checked between batches and during
    /// cooldown sleeps.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The policy this executor enforces.
    pub fn policy(&self) -> RatePolicy {
        self.policy
    }

    /// Executes all units, at most `batch_size` concurrently, sleeping for
    /// `cooldown` between consecutive batches.
    ///
    /// No cooldown follows the final batch. An empty unit list returns
    /// immediately without sleeping.
    pub async fn execute<U, R, Op, Fut>(&self, units: Vec<U>, op: Op) -> BatchRun<U, R>
    where
        U: Clone + Send,
        Op: Fn(U) -> Fut,
        Fut: std::future::Future<Output = Result<R, AppError>> + Send,
    {
        let total = units.len();
        let mut outcomes = Vec::with_capacity(total);
        let batch_count = total.div_ceil(self.policy.batch_size);

        for (batch_index, batch) in units.chunks(self.policy.batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    executed = outcomes.len(),
                    remaining = total - outcomes.len(),
                    "Batch execution cancelled"
                );
                return BatchRun {
                    outcomes,
                    cancelled: true,
                };
            }

            tracing::debug!(
                batch = batch_index + 1,
                batches = batch_count,
                size = batch.len(),
                "Executing batch"
            );

            let calls = batch.iter().cloned().map(|unit| {
                let fut = op(unit.clone());
                async move {
                    let started = tokio::time::Instant::now();
                    let result = fut.await;
                    UnitOutcome {
                        unit,
                        result,
                        duration: started.elapsed(),
                    }
                }
            });
            outcomes.extend(join_all(calls).await);

            // Cooldown between batches, never after the last one. Failed
            // calls still consumed the provider's budget, so the cooldown
            // is unconditional.
            let is_last = batch_index + 1 == batch_count;
            if !is_last && !self.policy.cooldown.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.policy.cooldown) => {}
                    _ = self.cancel.cancelled() => {
                        tracing::info!(
                            executed = outcomes.len(),
                            remaining = total - outcomes.len(),
                            "Batch execution cancelled during cooldown"
                        );
                        return BatchRun {
                            outcomes,
                            cancelled: true,
                        };
                    }
                }
            }
        }

        BatchRun {
            outcomes,
            cancelled: false,
        }
    }
}
