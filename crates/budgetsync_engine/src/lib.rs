//! # BudgetSync Engine
//!
//! In-memory budget replicas kept current with delta syncs.
//!
//! This crate provides:
//! - Keyed merge of delta payloads into local collections, tombstones included
//! - Replica construction with ID, name and parent indices
//! - Sync policy (none / delta / full) driven by freshness and dirty state
//! - Sync orchestration with per-budget serialization
//! - Drift detection against a full export, with self-healing
//! - Drift check scheduling by sync count and elapsed time
//! - Audit trail of raw payloads
//!
//! ## Architecture
//!
//! A [`ReplicaManager`] owns a [`ReplicaStore`] and a [`SyncProvider`]. On
//! each access it asks the [`SyncPolicy`] what to do, fetches accordingly,
//! merges, rebuilds indices and publishes the new replica as a whole.
//! After a delta sync the [`DriftCheckScheduler`] decides whether to also
//! fetch a full export and compare.
//!
//! ## Key Invariants
//!
//! - The server is authoritative; a full export always wins over a merge
//! - Indices are rebuilt from scratch after every change
//! - Readers never observe a partially merged replica
//! - Drift check and audit failures never fail a sync

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit;
mod config;
mod drift;
mod error;
mod manager;
mod merge;
mod policy;
mod provider;
mod replica;
mod scheduler;
mod store;

pub use audit::{AuditEntry, AuditSink, FileAuditSink, MemoryAuditSink};
pub use config::{
    DriftCheckConfig, SyncConfig, DEFAULT_SYNC_INTERVAL, ENV_ALWAYS_FULL_SYNC,
    ENV_DRIFT_CHECK_INTERVAL_MINUTES, ENV_DRIFT_CHECK_INTERVAL_SYNCS, ENV_DRIFT_DETECTION,
    ENV_SYNC_INTERVAL_SECONDS,
};
pub use drift::{
    compare_replicas, normalize_replica, DiffPath, Difference, DifferenceKind, DriftResult,
    PathSegment, Side,
};
pub use error::{SyncError, SyncResult};
pub use manager::{ReplicaManager, SyncOutcome, SyncStats};
pub use merge::{apply_delta, merge_entities, merge_months};
pub use policy::{SyncIntent, SyncPolicy, SyncType};
pub use provider::{MockProvider, ProviderCall, SyncProvider};
pub use replica::{
    build_replica, build_replica_at, rebuild_indices, LocalReplica, ReplicaIndex, ReplicaSummary,
};
pub use scheduler::{DriftCheckScheduler, SyncCheckState};
pub use store::ReplicaStore;
