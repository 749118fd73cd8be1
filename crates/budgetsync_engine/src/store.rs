//! Replica store.

use crate::replica::LocalReplica;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Holds the current replica of each budget, keyed by budget ID.
///
/// Cloning the store shares the underlying map, so a query layer can hold
/// a handle while the [`ReplicaManager`](crate::ReplicaManager) owns writes.
/// Replicas are published as whole `Arc`s: a reader either sees the old
/// replica or the new one, never a partially merged state.
#[derive(Debug, Clone, Default)]
pub struct ReplicaStore {
    replicas: Arc<RwLock<HashMap<String, Arc<LocalReplica>>>>,
}

impl ReplicaStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current replica for a budget.
    pub fn get(&self, replica_id: &str) -> Option<Arc<LocalReplica>> {
        self.replicas.read().get(replica_id).cloned()
    }

    /// Returns true if a replica is held for the budget.
    pub fn contains(&self, replica_id: &str) -> bool {
        self.replicas.read().contains_key(replica_id)
    }

    /// Returns the number of replicas held.
    pub fn len(&self) -> usize {
        self.replicas.read().len()
    }

    /// Returns true if no replica is held.
    pub fn is_empty(&self) -> bool {
        self.replicas.read().is_empty()
    }

    /// Returns the IDs of all held replicas, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.replicas.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Publishes a replica, replacing any previous one with the same ID.
    pub(crate) fn publish(&self, replica: LocalReplica) -> Arc<LocalReplica> {
        let replica = Arc::new(replica);
        self.replicas
            .write()
            .insert(replica.id.clone(), Arc::clone(&replica));
        replica
    }

    /// Sets the dirty flag on a held replica. Returns false if none is held.
    pub(crate) fn mark_dirty(&self, replica_id: &str) -> bool {
        let mut replicas = self.replicas.write();
        match replicas.get_mut(replica_id) {
            Some(replica) => {
                Arc::make_mut(replica).needs_sync = true;
                true
            }
            None => false,
        }
    }

    /// Evicts one replica.
    pub(crate) fn remove(&self, replica_id: &str) -> Option<Arc<LocalReplica>> {
        self.replicas.write().remove(replica_id)
    }

    /// Evicts every replica, returning how many were held.
    pub(crate) fn clear(&self) -> usize {
        let mut replicas = self.replicas.write();
        let count = replicas.len();
        replicas.clear();
        count
    }
}
