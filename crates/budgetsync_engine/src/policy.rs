//! Sync decision policy.

use crate::config::SyncConfig;
use crate::replica::LocalReplica;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// What a sync request should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    /// Serve the cached replica.
    None,
    /// Fetch changes since the replica's knowledge.
    Delta,
    /// Fetch a full export.
    Full,
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncType::None => "none",
            SyncType::Delta => "delta",
            SyncType::Full => "full",
        })
    }
}

/// Caller intent for a replica access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncIntent {
    /// Let the policy decide.
    #[default]
    Auto,
    /// Force a delta sync (still full if there is no replica yet).
    ForceDelta,
    /// Force a full sync.
    ForceFull,
}

/// Decides between no sync, a delta sync and a full sync.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    always_full: bool,
    sync_interval: Duration,
}

impl SyncPolicy {
    /// Creates a policy.
    pub fn new(always_full: bool, sync_interval: Duration) -> Self {
        Self {
            always_full,
            sync_interval,
        }
    }

    /// Creates a policy from the engine configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.always_full_sync, config.sync_interval)
    }

    /// Decides the sync type at the current time.
    pub fn decide(&self, existing: Option<&LocalReplica>, intent: SyncIntent) -> SyncType {
        self.decide_at(existing, intent, Utc::now())
    }

    /// Decides the sync type as of `now`. The first matching rule wins:
    ///
    /// 1. forced full
    /// 2. no replica yet
    /// 3. always-full mode
    /// 4. forced delta
    /// 5. replica marked dirty
    /// 6. replica older than the sync interval
    /// 7. otherwise serve from memory
    pub fn decide_at(
        &self,
        existing: Option<&LocalReplica>,
        intent: SyncIntent,
        now: DateTime<Utc>,
    ) -> SyncType {
        if intent == SyncIntent::ForceFull {
            return SyncType::Full;
        }
        let Some(replica) = existing else {
            return SyncType::Full;
        };
        if self.always_full {
            return SyncType::Full;
        }
        if intent == SyncIntent::ForceDelta || replica.needs_sync {
            return SyncType::Delta;
        }
        if self.is_stale(replica, now) {
            return SyncType::Delta;
        }
        SyncType::None
    }

    fn is_stale(&self, replica: &LocalReplica, now: DateTime<Utc>) -> bool {
        if self.sync_interval.is_zero() {
            return true;
        }
        // A sync time in the future (clock skew) counts as fresh.
        match (now - replica.last_synced_at).to_std() {
            Ok(elapsed) => elapsed > self.sync_interval,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::build_replica_at;
    use budgetsync_protocol::BudgetSnapshot;

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn replica_synced_at(at: DateTime<Utc>) -> LocalReplica {
        build_replica_at("b1", BudgetSnapshot::new("b1", "Budget"), 1, at)
    }

    #[test]
    fn missing_replica_bootstraps_full() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        assert_eq!(policy.decide(None, SyncIntent::Auto), SyncType::Full);
        assert_eq!(policy.decide(None, SyncIntent::ForceDelta), SyncType::Full);
    }

    #[test]
    fn forced_full_wins_over_everything() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        let now = Utc::now();
        let mut replica = replica_synced_at(now);
        replica.needs_sync = true;

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::ForceFull, now),
            SyncType::Full
        );
    }

    #[test]
    fn always_full_mode_bypasses_delta() {
        let policy = SyncPolicy::new(true, TEN_MINUTES);
        let now = Utc::now();
        let replica = replica_synced_at(now);

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::ForceDelta, now),
            SyncType::Full
        );
        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::Auto, now),
            SyncType::Full
        );
    }

    #[test]
    fn forced_delta_on_fresh_replica() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        let now = Utc::now();
        let replica = replica_synced_at(now);

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::ForceDelta, now),
            SyncType::Delta
        );
    }

    #[test]
    fn dirty_replica_within_interval_is_delta() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        let now = Utc::now();
        let mut replica = replica_synced_at(now - chrono::Duration::seconds(5));
        replica.needs_sync = true;

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::Auto, now),
            SyncType::Delta
        );
    }

    #[test]
    fn stale_replica_is_delta_fresh_is_none() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        let now = Utc::now();

        let fresh = replica_synced_at(now - chrono::Duration::seconds(599));
        assert_eq!(
            policy.decide_at(Some(&fresh), SyncIntent::Auto, now),
            SyncType::None
        );

        let stale = replica_synced_at(now - chrono::Duration::seconds(601));
        assert_eq!(
            policy.decide_at(Some(&stale), SyncIntent::Auto, now),
            SyncType::Delta
        );
    }

    #[test]
    fn zero_interval_always_resyncs() {
        let policy = SyncPolicy::new(false, Duration::ZERO);
        let now = Utc::now();
        let replica = replica_synced_at(now);

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::Auto, now),
            SyncType::Delta
        );
    }

    #[test]
    fn future_sync_time_counts_as_fresh() {
        let policy = SyncPolicy::new(false, TEN_MINUTES);
        let now = Utc::now();
        let replica = replica_synced_at(now + chrono::Duration::seconds(30));

        assert_eq!(
            policy.decide_at(Some(&replica), SyncIntent::Auto, now),
            SyncType::None
        );
    }

    #[test]
    fn from_config_reads_flags() {
        let config = SyncConfig::new().with_always_full_sync(true);
        let policy = SyncPolicy::from_config(&config);
        let replica = replica_synced_at(Utc::now());

        assert_eq!(
            policy.decide(Some(&replica), SyncIntent::Auto),
            SyncType::Full
        );
    }
}
