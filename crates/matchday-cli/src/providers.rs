//! File-based provider adapters.
//!
//! Feeds are JSON documents dropped into a directory tree, one file per
//! provider and scope:
//!
//! ```text
//! feeds/
//!   results/
//!     premier-league.json              # live feed for one scope
//!     archive/
//!       premier-league/
//!         2023-08-01.json              # one archive document per date
//! ```
//!
//! A feed document carries the entities to snapshot plus the change signals
//! the orchestrator consumes:
//!
//! ```json
//! {
//!   "newly_finished": true,
//!   "season": { "id": "2024-25", "start_date": "2024-08-10" },
//!   "entities": [
//!     { "entity_id": "team:arsenal", "logical_date": "2024-11-03",
//!       "payload": { "position": 2 } }
//!   ]
//! }
//! ```
//!
//! A missing file is a known-empty response (success, nothing to do); an
//! unreadable or unparseable file is an error.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use matchday_core::model::{FetchReport, Scope, SeasonMarker};
use matchday_core::provider::{BackfillSource, ProviderAdapter};
use matchday_core::snapshot::{NewSnapshot, SnapshotStore};
use matchday_core::{AppError, RatePolicy};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FeedDocument {
    #[serde(default)]
    newly_finished: bool,
    #[serde(default)]
    season: Option<FeedSeason>,
    #[serde(default)]
    entities: Vec<FeedEntity>,
}

#[derive(Debug, Deserialize)]
struct FeedSeason {
    id: String,
    start_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct FeedEntity {
    entity_id: String,
    logical_date: NaiveDate,
    payload: serde_json::Value,
}

/// Reads one feed document, distinguishing "no file" from real failures.
async fn read_document(path: &std::path::Path) -> Result<Option<FeedDocument>, AppError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::ProviderError(format!(
                "cannot read feed '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let document: FeedDocument = serde_json::from_str(&content).map_err(|e| {
        AppError::ParseError(format!("invalid feed document '{}': {}", path.display(), e))
    })?;
    Ok(Some(document))
}

fn to_snapshots(entities: Vec<FeedEntity>, scope: &Scope, source: &str) -> Vec<NewSnapshot> {
    entities
        .into_iter()
        .map(|entity| {
            NewSnapshot::new(
                entity.entity_id,
                scope.clone(),
                entity.logical_date,
                entity.payload,
                source,
            )
        })
        .collect()
}

// =============================================================================
// JsonFeedAdapter
// =============================================================================

/// Provider adapter over a directory of JSON feed documents.
#[derive(Clone)]
pub struct JsonFeedAdapter<S: SnapshotStore> {
    name: String,
    root: PathBuf,
    store: S,
    policy: RatePolicy,
    stale_after: Duration,
}

impl<S: SnapshotStore> JsonFeedAdapter<S> {
    pub fn new(
        name: impl Into<String>,
        root: PathBuf,
        store: S,
        policy: RatePolicy,
        stale_after: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            root,
            store,
            policy,
            stale_after,
        }
    }

    fn feed_path(&self, scope: &Scope) -> PathBuf {
        self.root
            .join(&self.name)
            .join(format!("{}.json", scope.as_str()))
    }
}

impl<S: SnapshotStore> ProviderAdapter for JsonFeedAdapter<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_policy(&self) -> RatePolicy {
        self.policy
    }

    fn stale_after(&self) -> Duration {
        self.stale_after
    }

    async fn fetch(&self, scope: &Scope) -> Result<FetchReport, AppError> {
        let path = self.feed_path(scope);
        let Some(document) = read_document(&path).await? else {
            tracing::debug!(provider = %self.name, scope = %scope, "No feed document; empty response");
            return Ok(FetchReport::empty());
        };

        let snapshots = to_snapshots(document.entities, scope, &self.name);
        let written = self.store.upsert_many(snapshots).await?;

        let mut report = FetchReport::processed(written);
        if document.newly_finished {
            report = report.with_newly_finished();
        }
        if let Some(season) = document.season {
            report = report.with_season(SeasonMarker::new(season.id, season.start_date));
        }
        Ok(report)
    }
}

// =============================================================================
// JsonArchiveSource
// =============================================================================

/// Backfill source over per-date archive documents.
#[derive(Clone)]
pub struct JsonArchiveSource<S: SnapshotStore> {
    provider: String,
    root: PathBuf,
    store: S,
    policy: RatePolicy,
}

impl<S: SnapshotStore> JsonArchiveSource<S> {
    pub fn new(provider: impl Into<String>, root: PathBuf, store: S, policy: RatePolicy) -> Self {
        Self {
            provider: provider.into(),
            root,
            store,
            policy,
        }
    }

    fn archive_path(&self, scope: &Scope, date: NaiveDate) -> PathBuf {
        self.root
            .join(&self.provider)
            .join("archive")
            .join(scope.as_str())
            .join(format!("{}.json", date))
    }
}

impl<S: SnapshotStore> BackfillSource for JsonArchiveSource<S> {
    fn source_name(&self) -> &str {
        &self.provider
    }

    fn rate_policy(&self) -> RatePolicy {
        self.policy
    }

    async fn fetch_range(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<usize, AppError> {
        let mut snapshots = Vec::new();
        let mut date = from;
        while date <= to {
            if let Some(document) = self.read_archive(scope, date).await? {
                snapshots.extend(to_snapshots(document.entities, scope, &self.provider));
            }
            match date.checked_add_days(Days::new(1)) {
                Some(next) => date = next,
                None => break,
            }
        }

        if snapshots.is_empty() {
            // Dates with no archive document are covered and empty.
            return Ok(0);
        }
        self.store.upsert_many(snapshots).await
    }
}

impl<S: SnapshotStore> JsonArchiveSource<S> {
    async fn read_archive(
        &self,
        scope: &Scope,
        date: NaiveDate,
    ) -> Result<Option<FeedDocument>, AppError> {
        read_document(&self.archive_path(scope, date)).await
    }
}
