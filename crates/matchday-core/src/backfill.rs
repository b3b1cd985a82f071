//! Resumable historical backfill.
//!
//! A backfill imports a provider's archive for one scope over a date range,
//! in serial chunks of consecutive dates. After every durably written chunk
//! the controller persists a checkpoint, so an interrupted backfill resumes
//! from the first uncovered date instead of starting over. Because snapshot
//! writes are idempotent, re-running any chunk is harmless; the checkpoint
//! exists to avoid wasted provider calls, not to protect correctness.
//!
//! # Cursor discipline
//!
//! The cursor is the first date *not yet* imported. It advances only after
//! the source confirmed the chunk's writes are durable. A failed chunk
//! leaves the cursor where it was, marks the checkpoint Failed, and stops
//! the run; nothing behind the cursor is ever revisited, nothing past a
//! failure is ever skipped over.

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::BackfillConfig;
use crate::error::AppError;
use crate::model::Scope;
use crate::progress::{SyncEvent, SyncReporter};
use crate::provider::BackfillSource;

// =============================================================================
// Checkpoint types
// =============================================================================

/// Lifecycle of one backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillStatus {
    /// Created, no chunk executed yet.
    Pending,
    /// At least one chunk executed; more remain.
    Running,
    /// Every date in the range is covered.
    Completed,
    /// A chunk failed; the cursor did not advance past it.
    Failed,
    /// Stopped by cancellation between chunks.
    Cancelled,
}

impl BackfillStatus {
    /// String form used for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackfillStatus::Pending => "pending",
            BackfillStatus::Running => "running",
            BackfillStatus::Completed => "completed",
            BackfillStatus::Failed => "failed",
            BackfillStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BackfillStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BackfillStatus::Pending),
            "running" => Ok(BackfillStatus::Running),
            "completed" => Ok(BackfillStatus::Completed),
            "failed" => Ok(BackfillStatus::Failed),
            "cancelled" => Ok(BackfillStatus::Cancelled),
            other => Err(AppError::ParseError(format!(
                "unknown backfill status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BackfillStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable progress record of one backfill, keyed by `(provider, scope)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillCheckpoint {
    pub provider: String,
    pub scope: Scope,
    /// First date of the requested range, inclusive.
    pub start_date: NaiveDate,
    /// Last date of the requested range, inclusive.
    pub end_date: NaiveDate,
    /// First date not yet imported. Equals `start_date` before any chunk
    /// lands and `end_date + 1` once completed.
    pub cursor: NaiveDate,
    pub status: BackfillStatus,
    /// Total records written across all completed chunks.
    pub records_imported: u64,
    /// Message of the failure that stopped the run, if any.
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BackfillCheckpoint {
    fn new(
        provider: &str,
        scope: &Scope,
        start_date: NaiveDate,
        end_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            scope: scope.clone(),
            start_date,
            end_date,
            cursor: start_date,
            status: BackfillStatus::Pending,
            records_imported: 0,
            last_error: None,
            updated_at: now,
        }
    }

    /// True if this checkpoint covers the same requested range.
    fn matches_range(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date == start && self.end_date == end
    }
}

/// Store for backfill checkpoints.
pub trait CheckpointStore: Send + Sync + Clone {
    /// Loads the checkpoint for a provider and scope, if one exists.
    fn load(
        &self,
        provider: &str,
        scope: &Scope,
    ) -> impl Future<Output = Result<Option<BackfillCheckpoint>, AppError>> + Send;

    /// Persists a checkpoint, replacing the existing one for its key.
    fn save(
        &self,
        checkpoint: &BackfillCheckpoint,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

// =============================================================================
// Date chunking
// =============================================================================

/// One inclusive run of consecutive dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChunk {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Splits the inclusive range `[from, to]` into consecutive chunks of at
/// most `chunk_days` dates. Returns nothing when `from > to`.
pub fn date_chunks(from: NaiveDate, to: NaiveDate, chunk_days: u32) -> Vec<DateChunk> {
    let chunk_days = chunk_days.max(1) as u64;
    let mut chunks = Vec::new();
    let mut cursor = from;
    while cursor <= to {
        let last = cursor
            .checked_add_days(Days::new(chunk_days - 1))
            .unwrap_or(to)
            .min(to);
        chunks.push(DateChunk {
            from: cursor,
            to: last,
        });
        match last.checked_add_days(Days::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    chunks
}

// =============================================================================
// Controller
// =============================================================================

/// Drives one backfill to completion, chunk by chunk.
pub struct BackfillController<B, K, C>
where
    B: BackfillSource,
    K: CheckpointStore,
    C: Clock,
{
    source: B,
    checkpoints: K,
    clock: C,
    config: BackfillConfig,
    cancel: CancellationToken,
}

impl<B, K, C> BackfillController<B, K, C>
where
    B: BackfillSource,
    K: CheckpointStore,
    C: Clock,
{
    pub fn new(source: B, checkpoints: K, clock: C, config: BackfillConfig) -> Self {
        Self {
            source,
            checkpoints,
            clock,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Attaches a cancellation token checked between chunks.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the backfill for `[from, to]`, resuming from an existing
    /// checkpoint when one covers the same range.
    ///
    /// Returns the final checkpoint. A chunk failure is not an `Err`: the
    /// checkpoint comes back with status [`BackfillStatus::Failed`] and the
    /// failure message, and the cursor still points at the failed chunk.
    /// `Err` is reserved for checkpoint-store problems and invalid input.
    pub async fn run<RP: SyncReporter>(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
        reporter: &RP,
    ) -> Result<BackfillCheckpoint, AppError> {
        if from > to {
            return Err(AppError::ConfigError(format!(
                "backfill range is empty: {} > {}",
                from, to
            )));
        }

        let provider = self.source.source_name();
        let mut checkpoint = match self.checkpoints.load(provider, scope).await? {
            Some(existing) if existing.matches_range(from, to) => {
                if existing.status == BackfillStatus::Completed {
                    tracing::info!(
                        provider = provider,
                        scope = %scope,
                        "Backfill already completed; nothing to do"
                    );
                    return Ok(existing);
                }
                tracing::info!(
                    provider = provider,
                    scope = %scope,
                    cursor = %existing.cursor,
                    "Resuming backfill from checkpoint"
                );
                existing
            }
            Some(_) | None => BackfillCheckpoint::new(provider, scope, from, to, self.clock.now()),
        };

        let chunks = date_chunks(checkpoint.cursor, to, self.config.chunk_days);
        let total_chunks = chunks.len();
        let cooldown = self.source.rate_policy().cooldown;

        for (index, chunk) in chunks.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                checkpoint.status = BackfillStatus::Cancelled;
                checkpoint.updated_at = self.clock.now();
                self.checkpoints.save(&checkpoint).await?;
                return Ok(checkpoint);
            }

            match self.source.fetch_range(scope, chunk.from, chunk.to).await {
                Ok(records) => {
                    // Writes are durable once fetch_range returns Ok; only
                    // now may the cursor move past the chunk.
                    checkpoint.records_imported += records as u64;
                    checkpoint.cursor = chunk
                        .to
                        .checked_add_days(Days::new(1))
                        .unwrap_or(chunk.to);
                    checkpoint.status = if checkpoint.cursor > to {
                        BackfillStatus::Completed
                    } else {
                        BackfillStatus::Running
                    };
                    checkpoint.last_error = None;
                    checkpoint.updated_at = self.clock.now();
                    self.checkpoints.save(&checkpoint).await?;

                    reporter.report(SyncEvent::BackfillChunkCompleted {
                        provider,
                        scope,
                        from: chunk.from,
                        to: chunk.to,
                        records,
                    });
                }
                Err(error) => {
                    let message = error.to_string();
                    checkpoint.status = BackfillStatus::Failed;
                    checkpoint.last_error = Some(message.clone());
                    checkpoint.updated_at = self.clock.now();
                    self.checkpoints.save(&checkpoint).await?;

                    reporter.report(SyncEvent::BackfillChunkFailed {
                        provider,
                        scope,
                        from: chunk.from,
                        error: &message,
                    });
                    return Ok(checkpoint);
                }
            }

            let is_last = index + 1 == total_chunks;
            if !is_last && !cooldown.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(cooldown) => {}
                    _ = self.cancel.cancelled() => {
                        checkpoint.status = BackfillStatus::Cancelled;
                        checkpoint.updated_at = self.clock.now();
                        self.checkpoints.save(&checkpoint).await?;
                        return Ok(checkpoint);
                    }
                }
            }
        }

        // A resumed checkpoint whose cursor already passed the end has no
        // chunks left; settle its status here.
        if checkpoint.cursor > to && checkpoint.status != BackfillStatus::Completed {
            checkpoint.status = BackfillStatus::Completed;
            checkpoint.updated_at = self.clock.now();
            self.checkpoints.save(&checkpoint).await?;
        }

        Ok(checkpoint)
    }
}
