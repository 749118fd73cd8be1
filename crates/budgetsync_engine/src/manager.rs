//! Sync orchestration.
//!
//! [`ReplicaManager`] is the only writer of its [`ReplicaStore`]. Each call
//! runs decide → fetch → merge → index rebuild → publish in that order while
//! holding a per-budget async lock, so two syncs of the same budget never
//! race to overwrite each other's merge result. Different budgets sync
//! concurrently.

use crate::audit::{AuditEntry, AuditSink};
use crate::config::SyncConfig;
use crate::drift::{compare_replicas, DriftResult};
use crate::error::SyncResult;
use crate::merge::apply_delta;
use crate::policy::{SyncIntent, SyncPolicy, SyncType};
use crate::provider::SyncProvider;
use crate::replica::{build_replica, LocalReplica};
use crate::scheduler::DriftCheckScheduler;
use crate::store::ReplicaStore;
use budgetsync_protocol::{BudgetSnapshot, SnapshotResponse, SyncKind};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Maximum number of individual drift differences written to the debug log.
const MAX_LOGGED_DIFFERENCES: usize = 20;

/// Counters describing sync activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed full syncs, self-heals excluded.
    pub full_syncs: u64,
    /// Completed delta syncs.
    pub delta_syncs: u64,
    /// Requests served from memory.
    pub cache_hits: u64,
    /// Drift checks started.
    pub drift_checks: u64,
    /// Drift checks that found differences.
    pub drifts_detected: u64,
    /// Replicas replaced by a full export after drift.
    pub self_heals: u64,
    /// Drift checks abandoned because the full fetch failed.
    pub drift_check_failures: u64,
    /// Audit writes that failed.
    pub audit_failures: u64,
    /// Delta responses rejected for moving knowledge backwards.
    pub knowledge_regressions: u64,
    /// Last successful sync time.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Last sync error message.
    pub last_error: Option<String>,
}

/// Result of a sync request.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The replica now published for the budget.
    pub replica: Arc<LocalReplica>,
    /// What the policy decided.
    pub sync_type: SyncType,
    /// Drift check result, when one ran and completed.
    pub drift: Option<DriftResult>,
    /// True if the merged replica was replaced by a full export.
    pub healed: bool,
}

/// Keeps budget replicas in sync with the remote API.
pub struct ReplicaManager<P: SyncProvider> {
    config: SyncConfig,
    policy: SyncPolicy,
    provider: Arc<P>,
    store: ReplicaStore,
    scheduler: DriftCheckScheduler,
    audit: Option<Arc<dyn AuditSink>>,
    sync_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    pending_audits: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<RwLock<SyncStats>>,
}

impl<P: SyncProvider> ReplicaManager<P> {
    /// Creates a manager with its own empty store and no audit sink.
    pub fn new(config: SyncConfig, provider: P) -> Self {
        Self {
            policy: SyncPolicy::from_config(&config),
            scheduler: DriftCheckScheduler::new(config.drift_check.clone()),
            config,
            provider: Arc::new(provider),
            store: ReplicaStore::new(),
            audit: None,
            sync_locks: Mutex::new(HashMap::new()),
            pending_audits: Mutex::new(Vec::new()),
            stats: Arc::new(RwLock::new(SyncStats::default())),
        }
    }

    /// Uses `store` instead of a private one.
    pub fn with_store(mut self, store: ReplicaStore) -> Self {
        self.store = store;
        self
    }

    /// Sends an audit entry to `sink` after every successful sync.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the store.
    pub fn store(&self) -> &ReplicaStore {
        &self.store
    }

    /// Returns the drift check scheduler.
    pub fn scheduler(&self) -> &DriftCheckScheduler {
        &self.scheduler
    }

    /// Returns a copy of the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the replica for a budget, syncing first if the policy says so.
    pub async fn get_replica(
        &self,
        replica_id: &str,
        intent: SyncIntent,
    ) -> SyncResult<Arc<LocalReplica>> {
        Ok(self.sync_replica(replica_id, intent).await?.replica)
    }

    /// Syncs a budget as decided by the policy and reports what happened.
    ///
    /// Errors from the primary fetch are returned unchanged and leave the
    /// previous replica in place. Drift check and audit failures are logged
    /// and never fail the call.
    pub async fn sync_replica(
        &self,
        replica_id: &str,
        intent: SyncIntent,
    ) -> SyncResult<SyncOutcome> {
        let lock = self.sync_lock(replica_id);
        let _guard = lock.lock().await;

        let existing = self.store.get(replica_id);
        let sync_type = self.policy.decide(existing.as_deref(), intent);
        tracing::debug!(replica_id, %sync_type, ?intent, "sync decided");

        let result = match (sync_type, existing) {
            (SyncType::None, Some(replica)) => {
                self.stats.write().cache_hits += 1;
                Ok(SyncOutcome {
                    replica,
                    sync_type,
                    drift: None,
                    healed: false,
                })
            }
            (SyncType::Delta, Some(replica)) => self.delta_sync(replica_id, replica).await,
            (_, existing) => self.full_sync(replica_id, existing).await,
        };

        if let Err(error) = &result {
            tracing::warn!(replica_id, %error, "sync failed");
            self.stats.write().last_error = Some(error.to_string());
        }
        result
    }

    /// Marks a budget's replica dirty after a local write, so the next
    /// access runs a delta sync. Returns false if no replica is held.
    pub fn mark_dirty(&self, replica_id: &str) -> bool {
        self.store.mark_dirty(replica_id)
    }

    /// Evicts one replica and its drift check state.
    pub fn clear_replica(&self, replica_id: &str) -> bool {
        self.scheduler.reset(replica_id);
        {
            let mut locks = self.sync_locks.lock();
            if locks
                .get(replica_id)
                .is_some_and(|lock| Arc::strong_count(lock) == 1)
            {
                locks.remove(replica_id);
            }
        }
        self.store.remove(replica_id).is_some()
    }

    /// Evicts every replica. Returns how many were held.
    pub fn clear_all(&self) -> usize {
        self.scheduler.reset_all();
        // Locks still held by an in-flight sync stay.
        self.sync_locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
        self.store.clear()
    }

    /// Waits for every audit write launched so far.
    pub async fn flush_audits(&self) {
        let handles = std::mem::take(&mut *self.pending_audits.lock());
        for handle in handles {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "audit task did not complete");
            }
        }
    }

    fn sync_lock(&self, replica_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.sync_locks.lock();
        Arc::clone(
            locks
                .entry(replica_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    async fn full_sync(
        &self,
        replica_id: &str,
        existing: Option<Arc<LocalReplica>>,
    ) -> SyncResult<SyncOutcome> {
        let start = Instant::now();
        let previous = existing.as_ref().map(|r| r.server_knowledge);

        let SnapshotResponse {
            snapshot,
            server_knowledge,
        } = self.provider.full_sync(replica_id).await?;
        let record_count = snapshot.record_count();
        let audit_snapshot = self.audit.as_ref().map(|_| snapshot.clone());

        let mut replica = build_replica(replica_id, snapshot, server_knowledge);
        replica.needs_sync = self.dirtied_during_sync(replica_id, existing.as_ref());
        let replica = self.store.publish(replica);

        self.record_audit(
            replica_id,
            SyncKind::Full,
            false,
            server_knowledge,
            previous,
            audit_snapshot,
        );
        {
            let mut stats = self.stats.write();
            stats.full_syncs += 1;
            stats.last_sync_time = Some(replica.last_synced_at);
            stats.last_error = None;
        }

        tracing::info!(
            replica_id,
            server_knowledge,
            previous_knowledge = ?previous,
            records = record_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "full sync complete"
        );

        Ok(SyncOutcome {
            replica,
            sync_type: SyncType::Full,
            drift: None,
            healed: false,
        })
    }

    async fn delta_sync(
        &self,
        replica_id: &str,
        existing: Arc<LocalReplica>,
    ) -> SyncResult<SyncOutcome> {
        let start = Instant::now();
        let previous = existing.server_knowledge;

        let response = self.provider.delta_sync(replica_id, previous).await?;
        if response.server_knowledge < previous {
            tracing::warn!(
                replica_id,
                previous_knowledge = previous,
                server_knowledge = response.server_knowledge,
                "delta moved knowledge backwards, falling back to full sync"
            );
            self.stats.write().knowledge_regressions += 1;
            return self.full_sync(replica_id, Some(existing)).await;
        }

        let SnapshotResponse {
            snapshot: delta,
            server_knowledge,
        } = response;
        let changes = delta.record_count();

        let mut merged = apply_delta(&existing, &delta, server_knowledge, Utc::now());
        merged.needs_sync = self.dirtied_during_sync(replica_id, Some(&existing));
        let merged = self.store.publish(merged);

        self.record_audit(
            replica_id,
            SyncKind::Delta,
            false,
            server_knowledge,
            Some(previous),
            self.audit.is_some().then_some(delta),
        );
        {
            let mut stats = self.stats.write();
            stats.delta_syncs += 1;
            stats.last_sync_time = Some(merged.last_synced_at);
            stats.last_error = None;
        }

        tracing::info!(
            replica_id,
            server_knowledge,
            previous_knowledge = previous,
            changes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "delta sync complete"
        );

        let mut outcome = SyncOutcome {
            replica: merged,
            sync_type: SyncType::Delta,
            drift: None,
            healed: false,
        };

        if self.config.drift_detection && self.scheduler.should_check_now(replica_id) {
            self.scheduler.record_check_performed(replica_id);
            self.check_drift(replica_id, &mut outcome).await;
        }

        Ok(outcome)
    }

    /// Compares the merged replica with a fresh full export and publishes
    /// the export instead if they differ.
    async fn check_drift(&self, replica_id: &str, outcome: &mut SyncOutcome) {
        self.stats.write().drift_checks += 1;

        let SnapshotResponse {
            snapshot,
            server_knowledge,
        } = match self.provider.full_sync(replica_id).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    replica_id,
                    %error,
                    "drift check fetch failed, keeping merged replica"
                );
                self.stats.write().drift_check_failures += 1;
                return;
            }
        };
        let audit_snapshot = self.audit.as_ref().map(|_| snapshot.clone());
        let truth = build_replica(replica_id, snapshot, server_knowledge);

        let result = match compare_replicas(&outcome.replica, &truth) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(replica_id, %error, "drift comparison failed");
                self.stats.write().drift_check_failures += 1;
                return;
            }
        };

        if result.knowledge_mismatch {
            tracing::info!(
                replica_id,
                merged_knowledge = result.merged_knowledge,
                truth_knowledge = result.truth_knowledge,
                "knowledge moved between delta and drift check"
            );
        }

        if result.has_drift {
            tracing::warn!(
                replica_id,
                differences = result.difference_count,
                summary = %result,
                "drift detected, replacing merged replica with full export"
            );
            for difference in result.differences.iter().take(MAX_LOGGED_DIFFERENCES) {
                tracing::debug!(
                    replica_id,
                    path = %difference.path,
                    kind = ?difference.kind,
                    "drift difference"
                );
            }

            let previous = outcome.replica.server_knowledge;
            let mut truth = truth;
            truth.needs_sync = outcome.replica.needs_sync
                || self.dirtied_during_sync(replica_id, Some(&outcome.replica));
            outcome.replica = self.store.publish(truth);
            outcome.healed = true;

            self.record_audit(
                replica_id,
                SyncKind::Full,
                true,
                server_knowledge,
                Some(previous),
                audit_snapshot,
            );
            let mut stats = self.stats.write();
            stats.drifts_detected += 1;
            stats.self_heals += 1;
        } else {
            tracing::debug!(replica_id, "no drift");
        }

        outcome.drift = Some(result);
    }

    /// Returns true if a local write marked the budget dirty after `read`
    /// was taken from the store.
    fn dirtied_during_sync(&self, replica_id: &str, read: Option<&Arc<LocalReplica>>) -> bool {
        match (self.store.get(replica_id), read) {
            (Some(current), Some(read)) => current.needs_sync && !Arc::ptr_eq(&current, read),
            _ => false,
        }
    }

    /// Launches an audit write without waiting for it.
    fn record_audit(
        &self,
        replica_id: &str,
        kind: SyncKind,
        self_heal: bool,
        server_knowledge: u64,
        previous_knowledge: Option<u64>,
        snapshot: Option<BudgetSnapshot>,
    ) {
        let (Some(sink), Some(snapshot)) = (self.audit.clone(), snapshot) else {
            return;
        };

        let entry = AuditEntry {
            replica_id: replica_id.to_string(),
            kind,
            self_heal,
            recorded_at: Utc::now(),
            server_knowledge,
            previous_knowledge,
            snapshot,
        };
        let stats = Arc::clone(&self.stats);
        let handle = tokio::spawn(async move {
            let replica_id = entry.replica_id.clone();
            if let Err(error) = sink.persist(entry).await {
                tracing::warn!(replica_id = %replica_id, %error, "audit write failed");
                stats.write().audit_failures += 1;
            }
        });

        let mut pending = self.pending_audits.lock();
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }
}
