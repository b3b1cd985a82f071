//! Domain types for sync runs.
//!
//! These types describe one orchestrator invocation: the scopes it touched,
//! the signals each work unit produced, and the per-phase summary. A
//! [`SyncRunReport`] is ephemeral — it exists for logging and for the caller
//! of one run, and is never persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Scope
// =============================================================================

/// The unit of work partitioning for sync: one competition, one league, or
/// the global pseudo-scope for providers without per-competition feeds.
///
/// Opaque to the orchestrator; only adapters interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    /// Creates a scope from any identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The pseudo-scope for providers that publish one global feed.
    pub fn global() -> Self {
        Self("global".to_string())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// =============================================================================
// Season marker
// =============================================================================

/// The season a provider response claims to describe.
///
/// Compared against the recorded current season to detect rollover; see
/// [`crate::season::is_new_season`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonMarker {
    /// Provider-visible season identifier, e.g. "2024-25".
    pub id: String,
    /// First day of the season according to the response.
    pub start_date: NaiveDate,
}

impl SeasonMarker {
    pub fn new(id: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            start_date,
        }
    }
}

// =============================================================================
// Fetch report
// =============================================================================

/// What one adapter call observed, beyond the snapshots it already wrote.
///
/// Adapters persist payloads through the snapshot store themselves; the
/// orchestrator only consumes the change signals carried here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Number of records written through the snapshot store.
    pub processed: usize,
    /// True if any match in this scope transitioned into a finished state
    /// that was not finished before.
    pub newly_finished: bool,
    /// The season the response claims to describe, when the payload says.
    pub observed_season: Option<SeasonMarker>,
}

impl FetchReport {
    /// A report for a known-empty response: success, nothing to do.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Report with a processed-record count.
    pub fn processed(count: usize) -> Self {
        Self {
            processed: count,
            ..Self::default()
        }
    }

    /// Flags newly finished matches in this scope.
    pub fn with_newly_finished(mut self) -> Self {
        self.newly_finished = true;
        self
    }

    /// Attaches the season the response described.
    pub fn with_season(mut self, marker: SeasonMarker) -> Self {
        self.observed_season = Some(marker);
        self
    }
}

// =============================================================================
// Sync phases
// =============================================================================

/// The three work-executing states of one orchestrator run.
///
/// A run always walks `Results → DerivedData → StructuralData` and returns to
/// idle; the latter two phases may execute zero units and be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Phase 1: refresh match results for every tracked scope.
    Results,
    /// Phase 2: refresh standings/ratings for scopes that changed.
    DerivedData,
    /// Phase 3: refresh season-scoped structural data (rosters).
    StructuralData,
}

impl SyncPhase {
    /// Returns the string representation used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Results => "results",
            SyncPhase::DerivedData => "derived_data",
            SyncPhase::StructuralData => "structural_data",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Run report
// =============================================================================

/// Summary of one executed phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseOutcome {
    /// Units handed to the batch executor.
    pub attempted: usize,
    /// Units whose adapter call returned Ok.
    pub succeeded: usize,
    /// Units whose adapter call returned Err.
    pub failed: usize,
    /// Scopes whose report triggered the next phase.
    pub flagged: Vec<Scope>,
}

impl PhaseOutcome {
    /// True if the phase executed no units at all.
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

/// The ephemeral record of one orchestrator invocation.
#[derive(Debug, Clone)]
pub struct SyncRunReport {
    /// Correlation id for log lines of this run.
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True if the run's hour matched the configured forced-full-sync hour.
    pub forced_full_sync: bool,
    /// True if the run stopped early on cancellation.
    pub cancelled: bool,
    pub results: PhaseOutcome,
    pub derived_data: PhaseOutcome,
    pub structural_data: PhaseOutcome,
}

impl SyncRunReport {
    /// Total units executed across all phases.
    pub fn total_units(&self) -> usize {
        self.results.attempted + self.derived_data.attempted + self.structural_data.attempted
    }

    /// Total failed units across all phases.
    pub fn total_failed(&self) -> usize {
        self.results.failed + self.derived_data.failed + self.structural_data.failed
    }
}
