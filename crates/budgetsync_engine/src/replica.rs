//! The local replica and its lookup indices.
//!
//! A [`LocalReplica`] is built once from a full export and afterwards only
//! replaced, never patched in place: the merge engine produces a new replica
//! and [`rebuild_indices`] derives every lookup map from scratch.

use crate::merge::{merge_entities, merge_months};
use budgetsync_protocol::{
    Account, BudgetSnapshot, Category, CategoryGroup, ChildEntity, Entity, Month, NamedEntity,
    Payee, PayeeLocation, ScheduledSubtransaction, ScheduledTransaction, Subtransaction,
    Transaction,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Client-side snapshot of one remote budget.
///
/// Collections only hold live records; tombstones are dropped on the way in.
/// The index is skipped when serializing since it is derived state.
#[derive(Debug, Clone, Serialize)]
pub struct LocalReplica {
    /// Budget ID.
    pub id: String,
    /// Budget name.
    pub name: String,
    /// Server knowledge this replica reflects.
    pub server_knowledge: u64,
    /// When the replica was last synced.
    pub last_synced_at: DateTime<Utc>,
    /// Set by local writes; forces a delta sync on next access.
    pub needs_sync: bool,
    pub(crate) accounts: Vec<Account>,
    pub(crate) categories: Vec<Category>,
    pub(crate) category_groups: Vec<CategoryGroup>,
    pub(crate) months: Vec<Month>,
    pub(crate) payees: Vec<Payee>,
    pub(crate) payee_locations: Vec<PayeeLocation>,
    pub(crate) scheduled_transactions: Vec<ScheduledTransaction>,
    pub(crate) scheduled_subtransactions: Vec<ScheduledSubtransaction>,
    pub(crate) subtransactions: Vec<Subtransaction>,
    pub(crate) transactions: Vec<Transaction>,
    #[serde(skip)]
    pub(crate) index: ReplicaIndex,
}

/// Builds a replica from a full export.
///
/// Each collection is deduplicated by identifier and stripped of tombstones,
/// `needs_sync` is cleared and `last_synced_at` is stamped with the current
/// time.
pub fn build_replica(
    id: impl Into<String>,
    snapshot: BudgetSnapshot,
    server_knowledge: u64,
) -> LocalReplica {
    build_replica_at(id, snapshot, server_knowledge, Utc::now())
}

/// Same as [`build_replica`] with an explicit sync time.
pub fn build_replica_at(
    id: impl Into<String>,
    snapshot: BudgetSnapshot,
    server_knowledge: u64,
    synced_at: DateTime<Utc>,
) -> LocalReplica {
    let replica = LocalReplica {
        id: id.into(),
        name: snapshot.name,
        server_knowledge,
        last_synced_at: synced_at,
        needs_sync: false,
        accounts: merge_entities(&[], &snapshot.accounts),
        categories: merge_entities(&[], &snapshot.categories),
        category_groups: merge_entities(&[], &snapshot.category_groups),
        months: merge_months(&[], &snapshot.months),
        payees: merge_entities(&[], &snapshot.payees),
        payee_locations: merge_entities(&[], &snapshot.payee_locations),
        scheduled_transactions: merge_entities(&[], &snapshot.scheduled_transactions),
        scheduled_subtransactions: merge_entities(&[], &snapshot.scheduled_subtransactions),
        subtransactions: merge_entities(&[], &snapshot.subtransactions),
        transactions: merge_entities(&[], &snapshot.transactions),
        index: ReplicaIndex::default(),
    };
    rebuild_indices(replica)
}

/// Discards the replica's index and derives a fresh one from its collections.
pub fn rebuild_indices(mut replica: LocalReplica) -> LocalReplica {
    replica.index = ReplicaIndex::build(&replica);
    replica
}

impl LocalReplica {
    /// Returns all accounts.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Returns all top-level categories.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Returns all category groups.
    pub fn category_groups(&self) -> &[CategoryGroup] {
        &self.category_groups
    }

    /// Returns all months.
    pub fn months(&self) -> &[Month] {
        &self.months
    }

    /// Returns all payees.
    pub fn payees(&self) -> &[Payee] {
        &self.payees
    }

    /// Returns all payee locations.
    pub fn payee_locations(&self) -> &[PayeeLocation] {
        &self.payee_locations
    }

    /// Returns all scheduled transactions.
    pub fn scheduled_transactions(&self) -> &[ScheduledTransaction] {
        &self.scheduled_transactions
    }

    /// Returns all scheduled subtransactions.
    pub fn scheduled_subtransactions(&self) -> &[ScheduledSubtransaction] {
        &self.scheduled_subtransactions
    }

    /// Returns all subtransactions.
    pub fn subtransactions(&self) -> &[Subtransaction] {
        &self.subtransactions
    }

    /// Returns all transactions.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Returns the lookup index.
    pub fn index(&self) -> &ReplicaIndex {
        &self.index
    }

    /// Looks up an account by ID.
    pub fn account(&self, id: &str) -> Option<&Account> {
        lookup(&self.accounts, &self.index.accounts_by_id, id)
    }

    /// Looks up an account by case-insensitive name.
    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        lookup(&self.accounts, &self.index.accounts_by_name, &normalize(name))
    }

    /// Looks up a category by ID.
    pub fn category(&self, id: &str) -> Option<&Category> {
        lookup(&self.categories, &self.index.categories_by_id, id)
    }

    /// Looks up a category by case-insensitive name.
    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        lookup(&self.categories, &self.index.categories_by_name, &normalize(name))
    }

    /// Looks up a category group by ID.
    pub fn category_group(&self, id: &str) -> Option<&CategoryGroup> {
        lookup(&self.category_groups, &self.index.category_groups_by_id, id)
    }

    /// Looks up a category group by case-insensitive name.
    pub fn category_group_by_name(&self, name: &str) -> Option<&CategoryGroup> {
        lookup(
            &self.category_groups,
            &self.index.category_groups_by_name,
            &normalize(name),
        )
    }

    /// Looks up a month by key.
    pub fn month(&self, key: &str) -> Option<&Month> {
        lookup(&self.months, &self.index.months_by_key, key)
    }

    /// Looks up a payee by ID.
    pub fn payee(&self, id: &str) -> Option<&Payee> {
        lookup(&self.payees, &self.index.payees_by_id, id)
    }

    /// Looks up a payee by case-insensitive name.
    pub fn payee_by_name(&self, name: &str) -> Option<&Payee> {
        lookup(&self.payees, &self.index.payees_by_name, &normalize(name))
    }

    /// Looks up a payee location by ID.
    pub fn payee_location(&self, id: &str) -> Option<&PayeeLocation> {
        lookup(&self.payee_locations, &self.index.payee_locations_by_id, id)
    }

    /// Looks up a transaction by ID.
    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        lookup(&self.transactions, &self.index.transactions_by_id, id)
    }

    /// Looks up a subtransaction by ID.
    pub fn subtransaction(&self, id: &str) -> Option<&Subtransaction> {
        lookup(&self.subtransactions, &self.index.subtransactions_by_id, id)
    }

    /// Returns the splits of a transaction, in collection order.
    pub fn subtransactions_of(&self, transaction_id: &str) -> Vec<&Subtransaction> {
        children(
            &self.subtransactions,
            &self.index.subtransactions_by_parent,
            transaction_id,
        )
    }

    /// Looks up a scheduled transaction by ID.
    pub fn scheduled_transaction(&self, id: &str) -> Option<&ScheduledTransaction> {
        lookup(
            &self.scheduled_transactions,
            &self.index.scheduled_transactions_by_id,
            id,
        )
    }

    /// Looks up a scheduled subtransaction by ID.
    pub fn scheduled_subtransaction(&self, id: &str) -> Option<&ScheduledSubtransaction> {
        lookup(
            &self.scheduled_subtransactions,
            &self.index.scheduled_subtransactions_by_id,
            id,
        )
    }

    /// Returns the splits of a scheduled transaction, in collection order.
    pub fn scheduled_subtransactions_of(
        &self,
        scheduled_transaction_id: &str,
    ) -> Vec<&ScheduledSubtransaction> {
        children(
            &self.scheduled_subtransactions,
            &self.index.scheduled_subtransactions_by_parent,
            scheduled_transaction_id,
        )
    }

    /// Copies the replica content back into a snapshot payload.
    pub fn to_snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            accounts: self.accounts.clone(),
            categories: self.categories.clone(),
            category_groups: self.category_groups.clone(),
            months: self.months.clone(),
            payees: self.payees.clone(),
            payee_locations: self.payee_locations.clone(),
            scheduled_transactions: self.scheduled_transactions.clone(),
            scheduled_subtransactions: self.scheduled_subtransactions.clone(),
            subtransactions: self.subtransactions.clone(),
            transactions: self.transactions.clone(),
        }
    }

    /// Returns per-collection record counts.
    pub fn summary(&self) -> ReplicaSummary {
        let collections = BTreeMap::from([
            (Account::COLLECTION.to_string(), self.accounts.len()),
            (Category::COLLECTION.to_string(), self.categories.len()),
            (CategoryGroup::COLLECTION.to_string(), self.category_groups.len()),
            ("months".to_string(), self.months.len()),
            (Payee::COLLECTION.to_string(), self.payees.len()),
            (PayeeLocation::COLLECTION.to_string(), self.payee_locations.len()),
            (
                ScheduledTransaction::COLLECTION.to_string(),
                self.scheduled_transactions.len(),
            ),
            (
                ScheduledSubtransaction::COLLECTION.to_string(),
                self.scheduled_subtransactions.len(),
            ),
            (Subtransaction::COLLECTION.to_string(), self.subtransactions.len()),
            (Transaction::COLLECTION.to_string(), self.transactions.len()),
        ]);

        ReplicaSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            server_knowledge: self.server_knowledge,
            last_synced_at: self.last_synced_at,
            needs_sync: self.needs_sync,
            collections,
        }
    }
}

/// Record counts and metadata of a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaSummary {
    /// Budget ID.
    pub id: String,
    /// Budget name.
    pub name: String,
    /// Server knowledge.
    pub server_knowledge: u64,
    /// Last sync time.
    pub last_synced_at: DateTime<Utc>,
    /// Dirty flag.
    pub needs_sync: bool,
    /// Record count per collection.
    pub collections: BTreeMap<String, usize>,
}

/// Lookup maps derived from a replica's collections.
///
/// Values are positions into the owning collection. Name keys are lowercased;
/// when two records share a normalized name the later one wins.
#[derive(Debug, Clone, Default)]
pub struct ReplicaIndex {
    accounts_by_id: HashMap<String, usize>,
    accounts_by_name: HashMap<String, usize>,
    categories_by_id: HashMap<String, usize>,
    categories_by_name: HashMap<String, usize>,
    category_groups_by_id: HashMap<String, usize>,
    category_groups_by_name: HashMap<String, usize>,
    months_by_key: HashMap<String, usize>,
    payees_by_id: HashMap<String, usize>,
    payees_by_name: HashMap<String, usize>,
    payee_locations_by_id: HashMap<String, usize>,
    scheduled_transactions_by_id: HashMap<String, usize>,
    scheduled_subtransactions_by_id: HashMap<String, usize>,
    scheduled_subtransactions_by_parent: HashMap<String, Vec<usize>>,
    subtransactions_by_id: HashMap<String, usize>,
    subtransactions_by_parent: HashMap<String, Vec<usize>>,
    transactions_by_id: HashMap<String, usize>,
    name_collisions: usize,
}

impl ReplicaIndex {
    fn build(replica: &LocalReplica) -> Self {
        let mut collisions = 0;

        let index = Self {
            accounts_by_id: by_id(&replica.accounts),
            accounts_by_name: by_name(&replica.accounts, &mut collisions),
            categories_by_id: by_id(&replica.categories),
            categories_by_name: by_name(&replica.categories, &mut collisions),
            category_groups_by_id: by_id(&replica.category_groups),
            category_groups_by_name: by_name(&replica.category_groups, &mut collisions),
            months_by_key: replica
                .months
                .iter()
                .enumerate()
                .map(|(pos, month)| (month.key().to_string(), pos))
                .collect(),
            payees_by_id: by_id(&replica.payees),
            payees_by_name: by_name(&replica.payees, &mut collisions),
            payee_locations_by_id: by_id(&replica.payee_locations),
            scheduled_transactions_by_id: by_id(&replica.scheduled_transactions),
            scheduled_subtransactions_by_id: by_id(&replica.scheduled_subtransactions),
            scheduled_subtransactions_by_parent: by_parent(&replica.scheduled_subtransactions),
            subtransactions_by_id: by_id(&replica.subtransactions),
            subtransactions_by_parent: by_parent(&replica.subtransactions),
            transactions_by_id: by_id(&replica.transactions),
            name_collisions: collisions,
        };

        if collisions > 0 {
            tracing::warn!(
                replica_id = %replica.id,
                collisions,
                "name index collisions, later records shadow earlier ones"
            );
        }

        index
    }

    /// Returns how many name-index entries were overwritten during the build.
    pub fn name_collisions(&self) -> usize {
        self.name_collisions
    }
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
}

fn by_id<E: Entity>(records: &[E]) -> HashMap<String, usize> {
    records
        .iter()
        .enumerate()
        .map(|(pos, record)| (record.id().to_string(), pos))
        .collect()
}

fn by_name<E: NamedEntity>(records: &[E], collisions: &mut usize) -> HashMap<String, usize> {
    let mut map = HashMap::with_capacity(records.len());
    for (pos, record) in records.iter().enumerate() {
        if let Some(previous) = map.insert(normalize(record.name()), pos) {
            *collisions += 1;
            tracing::debug!(
                collection = E::COLLECTION,
                name = record.name(),
                shadowed = records[previous].id(),
                winner = record.id(),
                "duplicate name in index"
            );
        }
    }
    map
}

fn by_parent<E: ChildEntity>(records: &[E]) -> HashMap<String, Vec<usize>> {
    let mut map: HashMap<String, Vec<usize>> = HashMap::new();
    for (pos, record) in records.iter().enumerate() {
        // Orphans are skipped rather than rejected.
        if let Some(parent) = record.parent_id() {
            map.entry(parent.to_string()).or_default().push(pos);
        }
    }
    map
}

fn lookup<'a, T>(records: &'a [T], map: &HashMap<String, usize>, key: &str) -> Option<&'a T> {
    map.get(key).and_then(|&pos| records.get(pos))
}

fn children<'a, T>(records: &'a [T], map: &HashMap<String, Vec<usize>>, key: &str) -> Vec<&'a T> {
    map.get(key)
        .map(|positions| positions.iter().filter_map(|&pos| records.get(pos)).collect())
        .unwrap_or_default()
}
