//! Matchday Core - Domain types, sync orchestration, and temporal snapshots.
//!
//! This crate provides the core functionality for matchday, including:
//!
//! - **Domain models**: [`Scope`], [`FetchReport`], [`SyncRunReport`], etc.
//! - **Orchestration**: [`SyncOrchestrator`] for phased, conditionally
//!   branching sync runs; [`Scheduler`] for fixed-cadence operation
//! - **Rate limiting**: [`BatchExecutor`] enforcing per-provider call budgets
//! - **Health**: [`HealthTracker`] deriving per-provider health states
//! - **Snapshots**: [`SnapshotStore`] for idempotent point-in-time storage
//!   with as-of retrieval
//! - **Backfill**: [`BackfillController`] for resumable historical imports
//! - **Progress reporting**: [`SyncReporter`] trait for decoupled logging/UI
//!
//! # Architecture
//!
//! Business logic is decoupled from I/O through traits, so the same
//! orchestrator runs against PostgreSQL-backed stores in production and
//! in-memory fakes in tests:
//!
//! - [`ProviderAdapter`] - abstracts one live data feed
//! - [`BackfillSource`] - abstracts a provider's historical archive
//! - [`SnapshotStore`] - abstracts versioned snapshot persistence
//! - [`CheckpointStore`] - abstracts backfill progress persistence
//! - [`Clock`] - abstracts the current instant; nothing reads wall time
//!   directly
//!
//! # Example
//!
//! ```ignore
//! use matchday_core::{OrchestratorConfig, SyncOrchestrator, SystemClock};
//! use matchday_core::progress::TracingReporter;
//!
//! let orchestrator = SyncOrchestrator::new(
//!     results, standings, roster, snapshot_repo, SystemClock,
//!     OrchestratorConfig::default(), scopes,
//! );
//! let report = orchestrator.run(&TracingReporter).await?;
//! println!("{} units, {} failed", report.total_units(), report.total_failed());
//! ```

pub mod backfill;
pub mod batch;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod scheduler;
pub mod season;
pub mod snapshot;

// Error handling
pub use error::AppError;

// Time source
pub use clock::{Clock, FixedClock, SystemClock};

// Configuration
pub use config::{
    BackfillConfig, DbConfig, OrchestratorConfig, ProviderEntry, ProvidersConfig, RatePolicy,
    default_config_path, load_providers_config,
};

// Domain models
pub use model::{
    FetchReport, PhaseOutcome, Scope, SeasonMarker, SyncPhase, SyncRunReport,
};

// Rate-limited execution
pub use batch::{BatchExecutor, BatchRun, UnitOutcome};

// Provider health
pub use health::{HealthTracker, IntegrationStatus, ProviderHealth};

// Snapshot storage
pub use snapshot::{NewSnapshot, Snapshot, SnapshotStore};

// Season rollover detection
pub use season::is_new_season;

// Provider seams
pub use provider::{BackfillSource, ProviderAdapter};

// Orchestration
pub use orchestrator::SyncOrchestrator;
pub use scheduler::{Scheduler, SchedulerConfig};

// Backfill
pub use backfill::{
    BackfillCheckpoint, BackfillController, BackfillStatus, CheckpointStore, DateChunk,
    date_chunks,
};

// Progress reporting
pub use progress::{SilentReporter, SyncEvent, SyncReporter, TracingReporter};
