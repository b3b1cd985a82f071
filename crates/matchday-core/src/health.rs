//! Per-provider health tracking.
//!
//! Each provider integration carries a health state derived from its recent
//! call outcomes. Health is advisory: the orchestrator keeps calling Degraded
//! and Failed providers on schedule, but operators can read the state (and
//! alert on Failed) through [`HealthTracker::all_statuses`]. Only an explicit
//! disable removes a provider from scheduled runs.
//!
//! Data consumers have a second, orthogonal question: is the data this
//! provider last delivered still fresh enough to use? That is answered by
//! [`IntegrationStatus::has_fresh_data`] against the provider's own staleness
//! threshold, and aggregated over all providers by
//! [`HealthTracker::availability`]. A missing or stale category is a normal
//! answer, not an error.
//!
//! State is derived, never stored: the tracker keeps counters and timestamps,
//! and [`IntegrationStatus::health`] computes the state from them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::Clock;

/// Consecutive failures at which a provider moves from Degraded to Failed.
pub const FAILED_THRESHOLD: u32 = 5;

/// Staleness threshold assumed for providers that record outcomes before
/// being registered with one of their own.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(6 * 3600);

/// Derived health state of one provider integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderHealth {
    /// No call recorded since registration or re-enable.
    Unknown,
    /// Last call succeeded and no failure streak is active.
    Healthy,
    /// 1 to 4 consecutive failures.
    Degraded,
    /// 5 or more consecutive failures.
    Failed,
    /// Explicitly disabled by an operator. Overrides everything else.
    Disabled,
}

impl ProviderHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderHealth::Unknown => "unknown",
            ProviderHealth::Healthy => "healthy",
            ProviderHealth::Degraded => "degraded",
            ProviderHealth::Failed => "failed",
            ProviderHealth::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for ProviderHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed state of one provider integration.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStatus {
    /// Provider name as registered.
    pub provider: String,
    /// Whether the provider participates in scheduled runs.
    pub enabled: bool,
    /// Operator-supplied reason when the provider is disabled.
    pub disabled_reason: Option<String>,
    /// Set on re-enable; health reads Unknown until the next outcome lands.
    pub awaiting_outcome: bool,
    /// Current failure streak; reset to zero by any success.
    pub consecutive_failures: u32,
    /// Instant of the last call, successful or not.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Instant of the last successful call, if any. Doubles as the data
    /// freshness timestamp: a success means the stored data was refreshed.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Instant of the last failed call, if any.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Age past which this provider's data no longer counts as fresh.
    #[serde(skip)]
    pub stale_after: Duration,
    /// Exponentially smoothed call duration; `(previous + latest) / 2`.
    #[serde(skip)]
    pub avg_duration: Option<Duration>,
}

impl IntegrationStatus {
    fn new(provider: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            provider: provider.into(),
            enabled: true,
            disabled_reason: None,
            awaiting_outcome: false,
            consecutive_failures: 0,
            last_attempt_at: None,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
            stale_after,
            avg_duration: None,
        }
    }

    /// Derives the health state from the stored counters.
    pub fn health(&self) -> ProviderHealth {
        if !self.enabled {
            return ProviderHealth::Disabled;
        }
        if self.awaiting_outcome {
            return ProviderHealth::Unknown;
        }
        match self.consecutive_failures {
            0 => {
                if self.last_success_at.is_some() {
                    ProviderHealth::Healthy
                } else {
                    ProviderHealth::Unknown
                }
            }
            n if n >= FAILED_THRESHOLD => ProviderHealth::Failed,
            _ => ProviderHealth::Degraded,
        }
    }

    /// True while the integration is worth calling: enabled, with a health
    /// state of Healthy or Degraded.
    pub fn is_operational(&self) -> bool {
        self.enabled
            && matches!(
                self.health(),
                ProviderHealth::Healthy | ProviderHealth::Degraded
            )
    }

    /// True if the last success is older than this provider's staleness
    /// threshold.
    ///
    /// A provider that never succeeded is always stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_success_at {
            Some(at) => {
                let age = now.signed_duration_since(at);
                age > chrono::TimeDelta::from_std(self.stale_after)
                    .unwrap_or(chrono::TimeDelta::MAX)
            }
            None => true,
        }
    }

    /// True when consumers can rely on this provider's data: the integration
    /// is operational and its last refresh is within the staleness threshold.
    pub fn has_fresh_data(&self, now: DateTime<Utc>) -> bool {
        self.is_operational() && !self.is_stale(now)
    }
}

/// Tracks health for every registered provider integration.
///
/// Clone-shared: all clones observe and mutate the same state. Time comes
/// from the injected [`Clock`], never from an ambient global.
#[derive(Debug, Clone)]
pub struct HealthTracker<C: Clock> {
    clock: C,
    statuses: Arc<Mutex<HashMap<String, IntegrationStatus>>>,
}

impl<C: Clock> HealthTracker<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            statuses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a provider in the Unknown state with its staleness
    /// threshold. Idempotent: an already registered provider keeps its
    /// history, but the threshold is updated.
    pub fn register(&self, provider: &str, stale_after: Duration) {
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| IntegrationStatus::new(provider, stale_after));
        status.stale_after = stale_after;
    }

    /// Records a successful call: clears the failure streak and the last
    /// error, stamps the attempt and success times, and folds the duration
    /// into the rolling average.
    pub fn record_success(&self, provider: &str, duration: Duration) {
        let now = self.clock.now();
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| IntegrationStatus::new(provider, DEFAULT_STALE_AFTER));

        status.consecutive_failures = 0;
        status.last_error = None;
        status.awaiting_outcome = false;
        status.last_attempt_at = Some(now);
        status.last_success_at = Some(now);
        status.avg_duration = Some(match status.avg_duration {
            Some(previous) => (previous + duration) / 2,
            None => duration,
        });

        tracing::debug!(
            provider = provider,
            duration_ms = duration.as_millis() as u64,
            "Provider call succeeded"
        );
    }

    /// Records a failed call: increments the failure streak and stamps the
    /// attempt and failure times and the message.
    ///
    /// Callers are expected to filter with
    /// [`AppError::counts_toward_health`](crate::error::AppError::counts_toward_health)
    /// first; skipped records never reach this method.
    pub fn record_failure(&self, provider: &str, error: &str) {
        let now = self.clock.now();
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| IntegrationStatus::new(provider, DEFAULT_STALE_AFTER));

        status.consecutive_failures += 1;
        status.awaiting_outcome = false;
        status.last_attempt_at = Some(now);
        status.last_failure_at = Some(now);
        status.last_error = Some(error.to_string());

        let health = status.health();
        if health == ProviderHealth::Failed {
            tracing::error!(
                provider = provider,
                consecutive_failures = status.consecutive_failures,
                error = error,
                "Provider marked failed"
            );
        } else {
            tracing::warn!(
                provider = provider,
                consecutive_failures = status.consecutive_failures,
                error = error,
                "Provider call failed"
            );
        }
    }

    /// Disables a provider with an operator-supplied reason. Its history is
    /// kept but its health reads Disabled until re-enabled.
    pub fn disable(&self, provider: &str, reason: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| IntegrationStatus::new(provider, DEFAULT_STALE_AFTER));
        status.enabled = false;
        status.disabled_reason = Some(reason.to_string());
        tracing::info!(provider = provider, reason = reason, "Provider disabled");
    }

    /// Re-enables a provider. The failure streak and disable reason are
    /// cleared and health returns to Unknown until the next call settles it.
    /// The freshness timestamp is kept: enabling does not age the data.
    pub fn enable(&self, provider: &str) {
        let mut statuses = self.statuses.lock().unwrap();
        let status = statuses
            .entry(provider.to_string())
            .or_insert_with(|| IntegrationStatus::new(provider, DEFAULT_STALE_AFTER));
        status.enabled = true;
        status.disabled_reason = None;
        status.consecutive_failures = 0;
        status.awaiting_outcome = true;
        tracing::info!(provider = provider, "Provider enabled");
    }

    /// True if the provider is enabled (or unregistered, which defaults to
    /// enabled on first use).
    pub fn is_enabled(&self, provider: &str) -> bool {
        let statuses = self.statuses.lock().unwrap();
        statuses.get(provider).map(|s| s.enabled).unwrap_or(true)
    }

    /// A point-in-time copy of one provider's status.
    pub fn status(&self, provider: &str) -> Option<IntegrationStatus> {
        let statuses = self.statuses.lock().unwrap();
        statuses.get(provider).cloned()
    }

    /// Point-in-time copies of every registered provider's status, sorted
    /// by provider name.
    pub fn all_statuses(&self) -> Vec<IntegrationStatus> {
        let statuses = self.statuses.lock().unwrap();
        let mut all: Vec<_> = statuses.values().cloned().collect();
        all.sort_by(|a, b| a.provider.cmp(&b.provider));
        all
    }

    /// Which data categories consumers can rely on right now: every
    /// registered provider paired with its [`IntegrationStatus::
    /// has_fresh_data`] answer, sorted by provider name.
    pub fn availability(&self) -> Vec<(String, bool)> {
        let now = self.clock.now();
        self.all_statuses()
            .into_iter()
            .map(|status| {
                let fresh = status.has_fresh_data(now);
                (status.provider, fresh)
            })
            .collect()
    }
}
