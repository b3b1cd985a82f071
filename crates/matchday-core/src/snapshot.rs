//! Temporal snapshot types and the store seam.
//!
//! A snapshot is one entity's full state as observed on one logical date:
//! a team's league standing after matchday 12, a roster as published on
//! August 1st. The store keeps every version; readers ask "what was the
//! state as of date D" and get the newest version at or before D.
//!
//! # Idempotence
//!
//! Snapshots are keyed by `(entity_id, scope, logical_date)`. Writing the
//! same key again replaces the payload in place and never creates a second
//! version. Re-running a sync or a backfill over already-covered dates is
//! therefore always safe.
//!
//! # As-of reads
//!
//! [`SnapshotStore::get_as_of`] returns the snapshot with the greatest
//! `logical_date` that is `<=` the requested date, or nothing if no version
//! existed yet. Versions after the requested date are never visible, no
//! matter when they were captured.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::model::{Scope, SeasonMarker};

/// A snapshot as it comes back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Surrogate id assigned by the store.
    pub id: Uuid,
    /// The entity this snapshot describes, e.g. a team or table id.
    pub entity_id: String,
    /// The competition the entity was observed in.
    pub scope: Scope,
    /// The date this state is true *for*, not the date it was written.
    pub logical_date: NaiveDate,
    /// The entity's full state on that date.
    pub payload: serde_json::Value,
    /// Which provider produced the payload.
    pub source: String,
    /// When the first version of this key was written.
    pub captured_at: DateTime<Utc>,
    /// When the key was last overwritten.
    pub updated_at: DateTime<Utc>,
}

/// A snapshot about to be written. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSnapshot {
    pub entity_id: String,
    pub scope: Scope,
    pub logical_date: NaiveDate,
    pub payload: serde_json::Value,
    pub source: String,
}

impl NewSnapshot {
    pub fn new(
        entity_id: impl Into<String>,
        scope: Scope,
        logical_date: NaiveDate,
        payload: serde_json::Value,
        source: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            scope,
            logical_date,
            payload,
            source: source.into(),
        }
    }
}

/// Store for versioned entity snapshots and per-scope season markers.
///
/// Implementations must honor the key contract: `(entity_id, scope,
/// logical_date)` identifies exactly one version, and writing an existing
/// key replaces its payload rather than adding a row.
pub trait SnapshotStore: Send + Sync + Clone {
    /// Writes one snapshot, replacing the version at the same key if any.
    fn upsert(&self, snapshot: NewSnapshot)
    -> impl Future<Output = Result<Snapshot, AppError>> + Send;

    /// Writes a batch of snapshots with upsert semantics. Returns the number
    /// written. All writes must be durable before this resolves; backfill
    /// checkpoints advance on the strength of that.
    fn upsert_many(
        &self,
        snapshots: Vec<NewSnapshot>,
    ) -> impl Future<Output = Result<usize, AppError>> + Send;

    /// Reads the newest version of the key at or before `as_of`.
    fn get_as_of(
        &self,
        entity_id: &str,
        scope: &Scope,
        as_of: NaiveDate,
    ) -> impl Future<Output = Result<Option<Snapshot>, AppError>> + Send;

    /// All versions of one entity within a scope, oldest first.
    fn history(
        &self,
        entity_id: &str,
        scope: &Scope,
    ) -> impl Future<Output = Result<Vec<Snapshot>, AppError>> + Send;

    /// The season currently recorded for a scope, if any run has set one.
    fn current_season(
        &self,
        scope: &Scope,
    ) -> impl Future<Output = Result<Option<SeasonMarker>, AppError>> + Send;

    /// Records a scope's current season, replacing the previous marker.
    fn record_season(
        &self,
        scope: &Scope,
        marker: &SeasonMarker,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Deletes versions with `logical_date` strictly before the cutoff.
    /// Returns the number deleted.
    fn prune_before(
        &self,
        scope: &Scope,
        cutoff: NaiveDate,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;
}
