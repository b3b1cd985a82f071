//! Configuration types for matchday components.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

// =============================================================================
// Rate policy
// =============================================================================

/// One provider's call budget: how many concurrent calls a batch may make and
/// how long to pause between batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    /// Maximum concurrent in-flight calls per batch. Must be ≥ 1.
    pub batch_size: usize,
    /// Mandatory pause between batches. Zero only for providers with no
    /// enforced rate limit.
    pub cooldown: Duration,
}

impl RatePolicy {
    /// Creates a policy, clamping the batch size to at least 1.
    pub fn new(batch_size: usize, cooldown: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            cooldown,
        }
    }

    /// A policy for providers with no enforced rate limit.
    pub fn unlimited(batch_size: usize) -> Self {
        Self::new(batch_size, Duration::ZERO)
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            batch_size: 4,
            cooldown: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Orchestrator configuration
// =============================================================================

/// Tuning for one orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Wall-clock hour (0–23, in UTC) at which phase 2 refreshes every scope
    /// regardless of change signals. `None` disables the daily safety net.
    pub forced_full_sync_hour: Option<u32>,
    /// Pause inserted between two phases that both execute work. Phases
    /// target different providers whose rate-limit buckets would otherwise
    /// be hit back-to-back.
    pub phase_cooldown: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            forced_full_sync_hour: None,
            phase_cooldown: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// Sets the forced-full-sync hour. Fails on hours outside 0..=23.
    pub fn with_forced_full_sync_hour(mut self, hour: u32) -> Result<Self, AppError> {
        if hour > 23 {
            return Err(AppError::ConfigError(format!(
                "forced_full_sync_hour must be 0..=23, got {}",
                hour
            )));
        }
        self.forced_full_sync_hour = Some(hour);
        Ok(self)
    }

    /// Sets the inter-phase cooldown.
    pub fn with_phase_cooldown(mut self, cooldown: Duration) -> Self {
        self.phase_cooldown = cooldown;
        self
    }
}

// =============================================================================
// Backfill configuration
// =============================================================================

/// Chunking for historical imports.
#[derive(Debug, Clone, Copy)]
pub struct BackfillConfig {
    /// Calendar days per chunk. 1 = one date per chunk; larger values batch
    /// a stretch of the season into one adapter call.
    pub chunk_days: u32,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { chunk_days: 1 }
    }
}

impl BackfillConfig {
    /// Sets the chunk length, clamping to at least one day.
    pub fn with_chunk_days(mut self, days: u32) -> Self {
        self.chunk_days = days.max(1);
        self
    }
}

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

// =============================================================================
// Provider configuration (providers.toml)
// =============================================================================

/// Default enabled status when not specified in configuration.
fn default_enabled() -> bool {
    true
}

fn default_batch_size() -> usize {
    4
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_stale_after_hours() -> u64 {
    6
}

/// Root configuration structure for providers.toml.
///
/// # Example
///
/// ```toml
/// scopes = ["premier-league", "la-liga"]
///
/// [[providers]]
/// name = "results"
/// batch_size = 4
/// cooldown_secs = 30
/// stale_after_hours = 6
///
/// [[providers]]
/// name = "odds"
/// batch_size = 1
/// cooldown_secs = 90
/// stale_after_hours = 168
/// enabled = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Competitions tracked by every sync run.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Wall-clock hour (UTC) for the daily forced full sync, if any.
    #[serde(default)]
    pub forced_full_sync_hour: Option<u32>,

    /// Array of provider definitions.
    pub providers: Vec<ProviderEntry>,
}

impl ProvidersConfig {
    /// Returns only enabled providers.
    pub fn enabled_providers(&self) -> Vec<&ProviderEntry> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }

    /// Find a provider by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Tracked scopes as domain values.
    pub fn tracked_scopes(&self) -> Vec<crate::model::Scope> {
        self.scopes.iter().map(crate::model::Scope::new).collect()
    }
}

/// A single provider entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Provider name; used for `--provider <name>` lookup, health tracking,
    /// and checkpoint keys.
    pub name: String,

    /// Whether this provider participates in scheduled runs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Concurrent calls per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between batches, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// How old this provider's data may get before it is considered stale.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,

    /// Optional human-readable description.
    pub description: Option<String>,
}

impl ProviderEntry {
    /// The provider's rate policy.
    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy::new(self.batch_size, Duration::from_secs(self.cooldown_secs))
    }

    /// The provider's staleness threshold.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_hours * 3600)
    }
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "providers.toml";

/// Returns the default configuration directory path.
///
/// Uses XDG Base Directory specification: `~/.config/matchday/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("matchday"))
}

/// Returns the default configuration file path.
///
/// Path: `~/.config/matchday/providers.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Default template content for a new providers.toml file.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# matchday provider configuration
#
# Usage:
#   matchday sync                  # One orchestrator run over all scopes
#   matchday run                   # Scheduled runs at a fixed cadence
#   matchday backfill --provider results --scope premier-league \
#       --from 2023-08-01 --to 2024-05-31
#
# Set enabled = false to keep a provider out of scheduled runs.
# stale_after_hours controls when the provider's data counts as stale.

scopes = ["premier-league"]

# Hour of day (UTC) for the daily forced full sync. Comment out to disable.
# forced_full_sync_hour = 4

[[providers]]
name = "results"
batch_size = 4
cooldown_secs = 30
stale_after_hours = 6
description = "Live match results"

[[providers]]
name = "standings"
batch_size = 2
cooldown_secs = 60
stale_after_hours = 48
description = "League tables and team ratings"

[[providers]]
name = "roster"
batch_size = 1
cooldown_secs = 60
stale_after_hours = 336
description = "Season-scoped team rosters"
"#;

/// Load provider configuration from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses the default XDG path.
///
/// # Returns
/// * `Ok(Some(config))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration file found at the default path
/// * `Err(e)` - Configuration file exists but is invalid
///
/// # Behavior
/// If no configuration file exists at the default path, a template file is
/// automatically created to help users get started.
pub fn load_providers_config(path: Option<PathBuf>) -> Result<Option<ProvidersConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            match create_default_config(&config_path) {
                Ok(()) => {
                    tracing::info!(
                        "Config file created at {}. Using default providers...",
                        config_path.display()
                    );
                }
                Err(e) => {
                    tracing::warn!("Could not create default config template: {}", e);
                    return Ok(None);
                }
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: ProvidersConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    if let Some(hour) = config.forced_full_sync_hour {
        if hour > 23 {
            return Err(AppError::ConfigError(format!(
                "forced_full_sync_hour must be 0..=23, got {}",
                hour
            )));
        }
    }

    Ok(Some(config))
}

/// Create a default configuration file with a template.
///
/// Creates the parent directory if it doesn't exist.
fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
