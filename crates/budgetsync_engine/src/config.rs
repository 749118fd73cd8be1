//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Enables or disables drift detection after delta syncs.
pub const ENV_DRIFT_DETECTION: &str = "BUDGETSYNC_DRIFT_DETECTION";
/// Forces every sync to be a full sync.
pub const ENV_ALWAYS_FULL_SYNC: &str = "BUDGETSYNC_ALWAYS_FULL_SYNC";
/// Seconds a replica stays fresh before a delta sync is due.
pub const ENV_SYNC_INTERVAL_SECONDS: &str = "BUDGETSYNC_SYNC_INTERVAL_SECONDS";
/// Run a drift check every N delta syncs.
pub const ENV_DRIFT_CHECK_INTERVAL_SYNCS: &str = "BUDGETSYNC_DRIFT_CHECK_INTERVAL_SYNCS";
/// Run a drift check when this many minutes passed since the last one.
pub const ENV_DRIFT_CHECK_INTERVAL_MINUTES: &str = "BUDGETSYNC_DRIFT_CHECK_INTERVAL_MINUTES";

/// Default freshness window for a replica.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(600);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Compare delta-merged replicas against a fresh full export.
    pub drift_detection: bool,
    /// Bypass delta sync entirely.
    pub always_full_sync: bool,
    /// How long a replica is served from memory before a delta sync.
    /// Zero means every request syncs.
    pub sync_interval: Duration,
    /// Drift check throttling.
    pub drift_check: DriftCheckConfig,
}

impl SyncConfig {
    /// Creates a configuration with development defaults: drift detection
    /// on, checked every cycle.
    pub fn new() -> Self {
        Self {
            drift_detection: true,
            always_full_sync: false,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            drift_check: DriftCheckConfig::every_cycle(),
        }
    }

    /// Enables or disables drift detection.
    pub fn with_drift_detection(mut self, enabled: bool) -> Self {
        self.drift_detection = enabled;
        self
    }

    /// Enables or disables always-full mode.
    pub fn with_always_full_sync(mut self, enabled: bool) -> Self {
        self.always_full_sync = enabled;
        self
    }

    /// Sets the freshness window.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the drift check throttling.
    pub fn with_drift_check(mut self, drift_check: DriftCheckConfig) -> Self {
        self.drift_check = drift_check;
        self
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, starting from defaults.
    ///
    /// Unset keys keep their default. Values that do not parse are errors.
    pub fn from_lookup<F>(lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(value) = lookup(ENV_DRIFT_DETECTION) {
            config.drift_detection = parse_bool(ENV_DRIFT_DETECTION, &value)?;
        }
        if let Some(value) = lookup(ENV_ALWAYS_FULL_SYNC) {
            config.always_full_sync = parse_bool(ENV_ALWAYS_FULL_SYNC, &value)?;
        }
        if let Some(value) = lookup(ENV_SYNC_INTERVAL_SECONDS) {
            let secs = parse_u64(ENV_SYNC_INTERVAL_SECONDS, &value)?;
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(value) = lookup(ENV_DRIFT_CHECK_INTERVAL_SYNCS) {
            let n = parse_u64(ENV_DRIFT_CHECK_INTERVAL_SYNCS, &value)?;
            config.drift_check.every_n_syncs = u32::try_from(n).map_err(|_| {
                SyncError::invalid_config(ENV_DRIFT_CHECK_INTERVAL_SYNCS, &value, "too large")
            })?;
        }
        if let Some(value) = lookup(ENV_DRIFT_CHECK_INTERVAL_MINUTES) {
            let minutes = parse_u64(ENV_DRIFT_CHECK_INTERVAL_MINUTES, &value)?;
            config.drift_check.interval = if minutes == 0 {
                None
            } else {
                Some(Duration::from_secs(minutes.saturating_mul(60)))
            };
        }

        Ok(config)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for how often drift checks run.
///
/// A check is due when either trigger fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriftCheckConfig {
    /// Check on every Nth evaluation. Zero disables the count trigger.
    pub every_n_syncs: u32,
    /// Check when this much time passed since the last check. A replica
    /// that was never checked is due on its first evaluation.
    pub interval: Option<Duration>,
}

impl DriftCheckConfig {
    /// Checks after every delta sync.
    pub fn every_cycle() -> Self {
        Self {
            every_n_syncs: 1,
            interval: None,
        }
    }

    /// Relaxed schedule for production: every 10 syncs or hourly.
    pub fn production() -> Self {
        Self {
            every_n_syncs: 10,
            interval: Some(Duration::from_secs(60 * 60)),
        }
    }

    /// Sets the count trigger.
    pub fn with_every_n_syncs(mut self, n: u32) -> Self {
        self.every_n_syncs = n;
        self
    }

    /// Sets the wall-clock trigger.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

impl Default for DriftCheckConfig {
    fn default() -> Self {
        Self::every_cycle()
    }
}

fn parse_bool(key: &str, value: &str) -> SyncResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(SyncError::invalid_config(key, value, "expected a boolean")),
    }
}

fn parse_u64(key: &str, value: &str) -> SyncResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::invalid_config(key, value, "expected a non-negative integer"))
}
