//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of `SnapshotStore` and
//! `CheckpointStore`, plus scripted provider adapters, for testing
//! `SyncOrchestrator` and `BackfillController` in isolation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use matchday_core::backfill::{BackfillCheckpoint, CheckpointStore};
use matchday_core::model::{FetchReport, Scope, SeasonMarker};
use matchday_core::provider::{BackfillSource, ProviderAdapter};
use matchday_core::snapshot::{NewSnapshot, Snapshot, SnapshotStore};
use matchday_core::{AppError, RatePolicy};
use uuid::Uuid;

// =============================================================================
// MemorySnapshotStore
// =============================================================================

type SnapshotKey = (String, Scope, NaiveDate);

/// In-memory snapshot store honoring the upsert and as-of contracts.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<Mutex<HashMap<SnapshotKey, Snapshot>>>,
    seasons: Arc<Mutex<HashMap<Scope, SeasonMarker>>>,
    /// When set, every write and season operation fails with this message.
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent store operations fail.
    #[allow(dead_code)]
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    /// Total number of stored versions across all keys.
    pub fn version_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }

    /// Pre-seeds a season marker.
    pub fn seed_season(&self, scope: &Scope, marker: SeasonMarker) {
        self.seasons.lock().unwrap().insert(scope.clone(), marker);
    }

    fn check_failure(&self) -> Result<(), AppError> {
        match self.fail_with.lock().unwrap().as_ref() {
            Some(message) => Err(AppError::Generic(message.clone())),
            None => Ok(()),
        }
    }

    fn store_one(&self, snapshot: NewSnapshot) -> Snapshot {
        let key = (
            snapshot.entity_id.clone(),
            snapshot.scope.clone(),
            snapshot.logical_date,
        );
        let now = chrono::Utc::now();
        let mut snapshots = self.snapshots.lock().unwrap();
        let stored = match snapshots.get(&key) {
            Some(existing) => Snapshot {
                id: existing.id,
                payload: snapshot.payload,
                source: snapshot.source,
                captured_at: existing.captured_at,
                updated_at: now,
                entity_id: snapshot.entity_id,
                scope: snapshot.scope,
                logical_date: snapshot.logical_date,
            },
            None => Snapshot {
                id: Uuid::new_v4(),
                entity_id: snapshot.entity_id,
                scope: snapshot.scope,
                logical_date: snapshot.logical_date,
                payload: snapshot.payload,
                source: snapshot.source,
                captured_at: now,
                updated_at: now,
            },
        };
        snapshots.insert(key, stored.clone());
        stored
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: NewSnapshot) -> Result<Snapshot, AppError> {
        self.check_failure()?;
        Ok(self.store_one(snapshot))
    }

    async fn upsert_many(&self, snapshots: Vec<NewSnapshot>) -> Result<usize, AppError> {
        self.check_failure()?;
        let count = snapshots.len();
        for snapshot in snapshots {
            self.store_one(snapshot);
        }
        Ok(count)
    }

    async fn get_as_of(
        &self,
        entity_id: &str,
        scope: &Scope,
        as_of: NaiveDate,
    ) -> Result<Option<Snapshot>, AppError> {
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots
            .values()
            .filter(|s| {
                s.entity_id == entity_id && &s.scope == scope && s.logical_date <= as_of
            })
            .max_by_key(|s| s.logical_date)
            .cloned())
    }

    async fn history(&self, entity_id: &str, scope: &Scope) -> Result<Vec<Snapshot>, AppError> {
        let snapshots = self.snapshots.lock().unwrap();
        let mut versions: Vec<_> = snapshots
            .values()
            .filter(|s| s.entity_id == entity_id && &s.scope == scope)
            .cloned()
            .collect();
        versions.sort_by_key(|s| s.logical_date);
        Ok(versions)
    }

    async fn current_season(&self, scope: &Scope) -> Result<Option<SeasonMarker>, AppError> {
        self.check_failure()?;
        Ok(self.seasons.lock().unwrap().get(scope).cloned())
    }

    async fn record_season(&self, scope: &Scope, marker: &SeasonMarker) -> Result<(), AppError> {
        self.check_failure()?;
        self.seasons
            .lock()
            .unwrap()
            .insert(scope.clone(), marker.clone());
        Ok(())
    }

    async fn prune_before(&self, scope: &Scope, cutoff: NaiveDate) -> Result<u64, AppError> {
        let mut snapshots = self.snapshots.lock().unwrap();
        let before = snapshots.len();
        snapshots.retain(|_, s| &s.scope != scope || s.logical_date >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }
}

// =============================================================================
// MemoryCheckpointStore
// =============================================================================

/// In-memory checkpoint store that also keeps the full save history, so
/// tests can assert on cursor movement.
#[derive(Clone, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Arc<Mutex<HashMap<(String, Scope), BackfillCheckpoint>>>,
    saves: Arc<Mutex<Vec<BackfillCheckpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every checkpoint state ever saved, in order.
    pub fn save_history(&self) -> Vec<BackfillCheckpoint> {
        self.saves.lock().unwrap().clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(
        &self,
        provider: &str,
        scope: &Scope,
    ) -> Result<Option<BackfillCheckpoint>, AppError> {
        let checkpoints = self.checkpoints.lock().unwrap();
        Ok(checkpoints
            .get(&(provider.to_string(), scope.clone()))
            .cloned())
    }

    async fn save(&self, checkpoint: &BackfillCheckpoint) -> Result<(), AppError> {
        self.checkpoints.lock().unwrap().insert(
            (checkpoint.provider.clone(), checkpoint.scope.clone()),
            checkpoint.clone(),
        );
        self.saves.lock().unwrap().push(checkpoint.clone());
        Ok(())
    }
}

// =============================================================================
// ScriptedAdapter
// =============================================================================

/// A scripted response for one adapter call.
pub enum Scripted {
    /// Return this report.
    Report(FetchReport),
    /// Fail with `AppError::ProviderError`.
    Fail(String),
    /// Fail with `AppError::StructuralMismatch` (does not count toward health).
    Mismatch(String),
}

/// Provider adapter that replays per-scope scripted responses and records
/// every call it receives.
///
/// Once a scope's script runs out, further calls return an empty report.
#[derive(Clone)]
pub struct ScriptedAdapter {
    name: String,
    policy: RatePolicy,
    scripts: Arc<Mutex<HashMap<Scope, VecDeque<Scripted>>>>,
    calls: Arc<Mutex<Vec<Scope>>>,
}

impl ScriptedAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: RatePolicy::unlimited(8),
            scripts: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Queues a response for one scope.
    pub fn script(&self, scope: &Scope, response: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(scope.clone())
            .or_default()
            .push_back(response);
    }

    /// Scopes this adapter was called with, in order.
    pub fn calls(&self) -> Vec<Scope> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ProviderAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_policy(&self) -> RatePolicy {
        self.policy
    }

    fn stale_after(&self) -> Duration {
        Duration::from_secs(6 * 3600)
    }

    async fn fetch(&self, scope: &Scope) -> Result<FetchReport, AppError> {
        self.calls.lock().unwrap().push(scope.clone());
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(scope)
            .and_then(|queue| queue.pop_front());
        match next {
            Some(Scripted::Report(report)) => Ok(report),
            Some(Scripted::Fail(message)) => Err(AppError::ProviderError(message)),
            Some(Scripted::Mismatch(message)) => Err(AppError::StructuralMismatch(message)),
            None => Ok(FetchReport::empty()),
        }
    }
}

// =============================================================================
// ScriptedBackfillSource
// =============================================================================

/// Backfill source that records requested ranges and fails on demand.
#[derive(Clone)]
pub struct ScriptedBackfillSource {
    name: String,
    policy: RatePolicy,
    /// Chunk start dates that should fail, consumed once each.
    fail_on: Arc<Mutex<Vec<NaiveDate>>>,
    calls: Arc<Mutex<Vec<(NaiveDate, NaiveDate)>>>,
    /// Records returned per imported date.
    records_per_day: usize,
}

impl ScriptedBackfillSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: RatePolicy::unlimited(1),
            fail_on: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            records_per_day: 2,
        }
    }

    pub fn with_policy(mut self, policy: RatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Makes the chunk starting on `date` fail once.
    pub fn fail_once_on(&self, date: NaiveDate) {
        self.fail_on.lock().unwrap().push(date);
    }

    /// Ranges this source was asked for, in order.
    pub fn calls(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BackfillSource for ScriptedBackfillSource {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn rate_policy(&self) -> RatePolicy {
        self.policy
    }

    async fn fetch_range(
        &self,
        _scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, AppError> {
        self.calls.lock().unwrap().push((from, to));

        let mut fail_on = self.fail_on.lock().unwrap();
        if let Some(position) = fail_on.iter().position(|d| *d == from) {
            fail_on.remove(position);
            return Err(AppError::ProviderError(format!(
                "archive unavailable for {}",
                from
            )));
        }

        let days = (to - from).num_days() as usize + 1;
        Ok(days * self.records_per_day)
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn season(id: &str, y: i32, m: u32, d: u32) -> SeasonMarker {
    SeasonMarker::new(id, date(y, m, d))
}
