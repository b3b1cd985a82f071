//! Provider adapter seams.
//!
//! The orchestrator and backfill controller never talk to a data source
//! directly. They call through these traits, which keep the core logic
//! independent of any concrete feed and let tests substitute scripted
//! adapters.
//!
//! Adapters own their payloads end to end: they fetch, parse, and persist
//! snapshots through a [`SnapshotStore`](crate::snapshot::SnapshotStore)
//! themselves, and hand back only the change signals the orchestrator needs
//! in a [`FetchReport`]. A known-empty response (no fixtures on this date)
//! is a successful empty report; an unreachable feed or an unparseable
//! payload is an error.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::RatePolicy;
use crate::error::AppError;
use crate::model::{FetchReport, Scope};

/// One provider integration as seen by the orchestrator.
pub trait ProviderAdapter: Send + Sync + Clone {
    /// Stable provider name; used for health tracking and logging.
    fn name(&self) -> &str;

    /// The call budget every batch against this provider must respect.
    fn rate_policy(&self) -> RatePolicy;

    /// How old this provider's data may get before it counts as stale.
    fn stale_after(&self) -> Duration;

    /// Fetches the provider's current data for one scope, persists the
    /// resulting snapshots, and reports what changed.
    fn fetch(&self, scope: &Scope) -> impl Future<Output = Result<FetchReport, AppError>> + Send;
}

/// A provider that can serve historical data for backfill.
///
/// Separate from [`ProviderAdapter`] because not every live feed keeps an
/// archive, and the archive often lives behind a different endpoint with
/// its own rate limits.
pub trait BackfillSource: Send + Sync + Clone {
    /// Stable source name; used for checkpoint keys and logging.
    fn source_name(&self) -> &str;

    /// The call budget for archive requests.
    fn rate_policy(&self) -> RatePolicy;

    /// Fetches and persists historical data for one scope over an inclusive
    /// date range, returning the number of records written.
    ///
    /// All writes must be durable before this resolves: the controller
    /// advances its checkpoint past the range as soon as this returns Ok.
    fn fetch_range(
        &self,
        scope: &Scope,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<usize, AppError>> + Send;
}
