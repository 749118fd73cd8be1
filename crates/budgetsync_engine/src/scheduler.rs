//! Drift check throttling.
//!
//! Each replica gets its own evaluation counter and last-check time so that
//! interleaved syncs of different budgets do not shift each other's schedule.

use crate::config::DriftCheckConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// Per-replica scheduler bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCheckState {
    /// Number of times the scheduler was asked about this replica.
    pub evaluations: u64,
    /// When a drift check last ran.
    pub last_check: Option<Instant>,
}

/// Decides when drift checks run.
#[derive(Debug)]
pub struct DriftCheckScheduler {
    config: DriftCheckConfig,
    states: Mutex<HashMap<String, SyncCheckState>>,
}

impl DriftCheckScheduler {
    /// Creates a scheduler.
    pub fn new(config: DriftCheckConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DriftCheckConfig {
        &self.config
    }

    /// Returns true if a drift check is due for `replica_id` now.
    ///
    /// Every call counts as an evaluation, whatever the outcome.
    pub fn should_check_now(&self, replica_id: &str) -> bool {
        self.should_check_at(replica_id, Instant::now())
    }

    /// Same as [`should_check_now`](Self::should_check_now) as of `now`.
    pub fn should_check_at(&self, replica_id: &str, now: Instant) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(replica_id.to_string()).or_default();
        state.evaluations += 1;

        let count_due = self.config.every_n_syncs > 0
            && state.evaluations % u64::from(self.config.every_n_syncs) == 0;

        let time_due = match (self.config.interval, state.last_check) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            (Some(_), None) => true,
            (None, _) => false,
        };

        tracing::trace!(
            replica_id,
            evaluations = state.evaluations,
            count_due,
            time_due,
            "drift check evaluation"
        );

        count_due || time_due
    }

    /// Records that a drift check ran for `replica_id`.
    pub fn record_check_performed(&self, replica_id: &str) {
        self.record_check_at(replica_id, Instant::now());
    }

    /// Same as [`record_check_performed`](Self::record_check_performed) as of `now`.
    pub fn record_check_at(&self, replica_id: &str, now: Instant) {
        self.states
            .lock()
            .entry(replica_id.to_string())
            .or_default()
            .last_check = Some(now);
    }

    /// Forgets the state of one replica.
    pub fn reset(&self, replica_id: &str) {
        self.states.lock().remove(replica_id);
    }

    /// Forgets the state of every replica.
    pub fn reset_all(&self) {
        self.states.lock().clear();
    }

    /// Returns a copy of the state for `replica_id`, if any.
    pub fn state(&self, replica_id: &str) -> Option<SyncCheckState> {
        self.states.lock().get(replica_id).copied()
    }
}

impl Default for DriftCheckScheduler {
    fn default() -> Self {
        Self::new(DriftCheckConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn count_only(n: u32) -> DriftCheckScheduler {
        DriftCheckScheduler::new(DriftCheckConfig {
            every_n_syncs: n,
            interval: None,
        })
    }

    #[test]
    fn default_checks_every_cycle() {
        let scheduler = DriftCheckScheduler::default();
        assert!(scheduler.should_check_now("b1"));
        assert!(scheduler.should_check_now("b1"));
        assert!(scheduler.should_check_now("b1"));
    }

    #[test]
    fn every_third_evaluation_with_n_3() {
        let scheduler = count_only(3);
        let pattern: Vec<bool> = (0..6).map(|_| scheduler.should_check_now("b1")).collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn replicas_are_counted_independently() {
        let scheduler = count_only(3);

        assert!(!scheduler.should_check_now("a"));
        assert!(!scheduler.should_check_now("a"));
        assert!(!scheduler.should_check_now("b"));
        assert!(scheduler.should_check_now("a"));
        assert!(!scheduler.should_check_now("b"));
        assert!(scheduler.should_check_now("b"));
    }

    #[test]
    fn zero_count_and_no_interval_never_checks() {
        let scheduler = count_only(0);
        assert!((0..5).all(|_| !scheduler.should_check_now("b1")));
    }

    #[test]
    fn interval_trigger_fires_independently_of_count() {
        let scheduler = DriftCheckScheduler::new(DriftCheckConfig {
            every_n_syncs: 100,
            interval: Some(Duration::from_secs(60)),
        });
        let start = Instant::now();

        // Never checked: due immediately.
        assert!(scheduler.should_check_at("b1", start));
        scheduler.record_check_at("b1", start);

        assert!(!scheduler.should_check_at("b1", start + Duration::from_secs(30)));
        assert!(scheduler.should_check_at("b1", start + Duration::from_secs(60)));
    }

    #[test]
    fn production_preset_checks_first_delta() {
        let scheduler = DriftCheckScheduler::new(DriftCheckConfig::production());
        let start = Instant::now();

        assert!(scheduler.should_check_at("b1", start));
        scheduler.record_check_at("b1", start);
        assert!(!scheduler.should_check_at("b1", start + Duration::from_secs(60)));
    }

    #[test]
    fn evaluations_count_regardless_of_outcome() {
        let scheduler = count_only(5);
        for _ in 0..3 {
            scheduler.should_check_now("b1");
        }
        assert_eq!(scheduler.state("b1").unwrap().evaluations, 3);
        assert!(scheduler.state("b1").unwrap().last_check.is_none());

        scheduler.record_check_performed("b1");
        assert!(scheduler.state("b1").unwrap().last_check.is_some());
    }

    #[test]
    fn reset_clears_state() {
        let scheduler = count_only(2);
        assert!(!scheduler.should_check_now("a"));
        assert!(!scheduler.should_check_now("b"));

        scheduler.reset("a");
        assert!(scheduler.state("a").is_none());
        assert!(!scheduler.should_check_now("a"));
        assert!(scheduler.should_check_now("b"));

        scheduler.reset_all();
        assert!(scheduler.state("b").is_none());
    }
}
