//! An in-process budget server.
//!
//! [`SimulatedBudgetServer`] keeps a version per record, so it can answer
//! both full exports and "changes since knowledge" requests the way the
//! remote API does: deltas carry every record touched since the given
//! knowledge, tombstones included, and months only list the categories
//! that changed.

use async_trait::async_trait;
use budgetsync_engine::{SyncError, SyncProvider, SyncResult};
use budgetsync_protocol::{
    Account, BudgetSnapshot, Category, CategoryGroup, Entity, Month, Payee, PayeeLocation,
    ScheduledSubtransaction, ScheduledTransaction, SnapshotResponse, Subtransaction, Transaction,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Versioned<T> {
    record: T,
    version: u64,
}

/// Records of one collection, each tagged with the knowledge of its last write.
#[derive(Debug, Clone)]
pub struct VersionedTable<T> {
    rows: BTreeMap<String, Versioned<T>>,
}

impl<T> Default for VersionedTable<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Entity> VersionedTable<T> {
    fn upsert(&mut self, record: T, version: u64) {
        self.rows
            .insert(record.id().to_string(), Versioned { record, version });
    }

    fn delete(&mut self, id: &str, version: u64) -> bool {
        match self.rows.get_mut(id) {
            Some(row) if !row.record.is_deleted() => {
                row.record.set_deleted(true);
                row.version = version;
                true
            }
            _ => false,
        }
    }

    fn live(&self) -> Vec<T> {
        self.rows
            .values()
            .filter(|row| !row.record.is_deleted())
            .map(|row| row.record.clone())
            .collect()
    }

    fn changed_since(&self, knowledge: u64) -> Vec<T> {
        self.rows
            .values()
            .filter(|row| row.version > knowledge)
            .map(|row| row.record.clone())
            .collect()
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.rows
            .get(id)
            .map(|row| &row.record)
            .filter(|record| !record.is_deleted())
    }

    fn max_version(&self) -> u64 {
        self.rows.values().map(|row| row.version).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
struct MonthRow {
    header: Month,
    version: u64,
    categories: VersionedTable<Category>,
}

impl MonthRow {
    fn latest_version(&self) -> u64 {
        self.version.max(self.categories.max_version())
    }
}

/// Server-side state of one budget.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBudget {
    name: String,
    knowledge: u64,
    accounts: VersionedTable<Account>,
    categories: VersionedTable<Category>,
    category_groups: VersionedTable<CategoryGroup>,
    months: BTreeMap<String, MonthRow>,
    payees: VersionedTable<Payee>,
    payee_locations: VersionedTable<PayeeLocation>,
    scheduled_transactions: VersionedTable<ScheduledTransaction>,
    scheduled_subtransactions: VersionedTable<ScheduledSubtransaction>,
    subtransactions: VersionedTable<Subtransaction>,
    transactions: VersionedTable<Transaction>,
}

impl SimulatedBudget {
    fn bump(&mut self) -> u64 {
        self.knowledge += 1;
        self.knowledge
    }

    fn upsert_month(&mut self, month: Month, version: u64) {
        let row = self.months.entry(month.month.clone()).or_default();
        let Month { categories, .. } = &month;
        for category in categories {
            row.categories.upsert(category.clone(), version);
        }
        row.header = Month {
            categories: Vec::new(),
            ..month
        };
        row.version = version;
    }

    fn export(&self, id: &str) -> BudgetSnapshot {
        let mut snapshot = BudgetSnapshot::new(id, self.name.clone());
        snapshot.accounts = self.accounts.live();
        snapshot.categories = self.categories.live();
        snapshot.category_groups = self.category_groups.live();
        snapshot.months = self
            .months
            .values()
            .filter(|row| !row.header.deleted)
            .map(|row| Month {
                categories: row.categories.live(),
                ..row.header.clone()
            })
            .collect();
        snapshot.payees = self.payees.live();
        snapshot.payee_locations = self.payee_locations.live();
        snapshot.scheduled_transactions = self.scheduled_transactions.live();
        snapshot.scheduled_subtransactions = self.scheduled_subtransactions.live();
        snapshot.subtransactions = self.subtransactions.live();
        snapshot.transactions = self.transactions.live();
        snapshot
    }

    fn changes_since(&self, id: &str, knowledge: u64) -> BudgetSnapshot {
        let mut snapshot = BudgetSnapshot::new(id, self.name.clone());
        snapshot.accounts = self.accounts.changed_since(knowledge);
        snapshot.categories = self.categories.changed_since(knowledge);
        snapshot.category_groups = self.category_groups.changed_since(knowledge);
        snapshot.months = self
            .months
            .values()
            .filter(|row| row.latest_version() > knowledge)
            .map(|row| Month {
                categories: row.categories.changed_since(knowledge),
                ..row.header.clone()
            })
            .collect();
        snapshot.payees = self.payees.changed_since(knowledge);
        snapshot.payee_locations = self.payee_locations.changed_since(knowledge);
        snapshot.scheduled_transactions = self.scheduled_transactions.changed_since(knowledge);
        snapshot.scheduled_subtransactions =
            self.scheduled_subtransactions.changed_since(knowledge);
        snapshot.subtransactions = self.subtransactions.changed_since(knowledge);
        snapshot.transactions = self.transactions.changed_since(knowledge);
        snapshot
    }
}

/// A record type the simulated server stores in its own table.
pub trait SimulatedCollection: Entity {
    /// Returns this type's table within a budget.
    fn table(budget: &mut SimulatedBudget) -> &mut VersionedTable<Self>;
}

macro_rules! simulated_collection {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl SimulatedCollection for $ty {
                fn table(budget: &mut SimulatedBudget) -> &mut VersionedTable<Self> {
                    &mut budget.$field
                }
            }
        )*
    };
}

simulated_collection! {
    Account => accounts,
    Category => categories,
    CategoryGroup => category_groups,
    Payee => payees,
    PayeeLocation => payee_locations,
    ScheduledTransaction => scheduled_transactions,
    ScheduledSubtransaction => scheduled_subtransactions,
    Subtransaction => subtransactions,
    Transaction => transactions,
}

/// A [`SyncProvider`] backed by in-memory, versioned budgets.
///
/// Every write bumps the budget's server knowledge by one and stamps the
/// touched records with the new value.
#[derive(Debug)]
pub struct SimulatedBudgetServer {
    budgets: RwLock<HashMap<String, SimulatedBudget>>,
    available: AtomicBool,
    drop_next_delta: AtomicBool,
    full_failure: Mutex<Option<String>>,
    full_calls: AtomicUsize,
    delta_calls: AtomicUsize,
}

impl Default for SimulatedBudgetServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBudgetServer {
    /// Creates a server with no budgets.
    pub fn new() -> Self {
        Self {
            budgets: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            drop_next_delta: AtomicBool::new(false),
            full_failure: Mutex::new(None),
            full_calls: AtomicUsize::new(0),
            delta_calls: AtomicUsize::new(0),
        }
    }

    /// Creates an empty budget at knowledge 0, replacing any existing one.
    pub fn create_budget(&self, budget_id: &str, name: &str) {
        self.budgets.write().insert(
            budget_id.to_string(),
            SimulatedBudget {
                name: name.to_string(),
                ..Default::default()
            },
        );
    }

    /// Creates a budget holding every live record of `snapshot`, written
    /// in a single knowledge step. Returns the new knowledge.
    pub fn seed(&self, budget_id: &str, snapshot: &BudgetSnapshot) -> u64 {
        let mut budget = SimulatedBudget {
            name: snapshot.name.clone(),
            ..Default::default()
        };
        let version = budget.bump();

        fn load<T: SimulatedCollection>(budget: &mut SimulatedBudget, records: &[T], version: u64) {
            for record in records.iter().filter(|r| !r.is_deleted()) {
                T::table(budget).upsert(record.clone(), version);
            }
        }

        load(&mut budget, &snapshot.accounts, version);
        load(&mut budget, &snapshot.categories, version);
        load(&mut budget, &snapshot.category_groups, version);
        load(&mut budget, &snapshot.payees, version);
        load(&mut budget, &snapshot.payee_locations, version);
        load(&mut budget, &snapshot.scheduled_transactions, version);
        load(&mut budget, &snapshot.scheduled_subtransactions, version);
        load(&mut budget, &snapshot.subtransactions, version);
        load(&mut budget, &snapshot.transactions, version);
        for month in snapshot.months.iter().filter(|m| !m.deleted) {
            let mut month = month.clone();
            month.categories.retain(|c| !c.deleted);
            budget.upsert_month(month, version);
        }

        self.budgets.write().insert(budget_id.to_string(), budget);
        version
    }

    /// Returns the current knowledge of a budget.
    pub fn knowledge(&self, budget_id: &str) -> Option<u64> {
        self.budgets.read().get(budget_id).map(|b| b.knowledge)
    }

    /// Returns the full export a client would receive right now.
    pub fn export(&self, budget_id: &str) -> Option<BudgetSnapshot> {
        self.budgets
            .read()
            .get(budget_id)
            .map(|budget| budget.export(budget_id))
    }

    /// Returns true if a live record with `id` exists in `T`'s collection.
    pub fn contains<T: SimulatedCollection>(&self, budget_id: &str, id: &str) -> bool {
        self.budgets
            .write()
            .get_mut(budget_id)
            .is_some_and(|budget| T::table(budget).get(id).is_some())
    }

    /// Inserts or replaces a record. Returns the new knowledge.
    pub fn upsert<T: SimulatedCollection>(&self, budget_id: &str, record: T) -> SyncResult<u64> {
        self.write(budget_id, |budget, version| {
            T::table(budget).upsert(record, version);
            true
        })
    }

    /// Tombstones a live record. Returns the new knowledge, or `None` if
    /// there was no such live record (knowledge is then left unchanged).
    pub fn delete<T: SimulatedCollection>(
        &self,
        budget_id: &str,
        id: &str,
    ) -> SyncResult<Option<u64>> {
        self.write_if(budget_id, |budget, version| {
            T::table(budget).delete(id, version)
        })
    }

    /// Inserts or replaces a month header and the categories it lists.
    /// Categories the month already holds but `month` omits are kept.
    pub fn upsert_month(&self, budget_id: &str, month: Month) -> SyncResult<u64> {
        self.write(budget_id, |budget, version| {
            budget.upsert_month(month, version);
            true
        })
    }

    /// Inserts or replaces one category balance within a month, creating
    /// the month if needed.
    pub fn upsert_month_category(
        &self,
        budget_id: &str,
        month: &str,
        category: Category,
    ) -> SyncResult<u64> {
        self.write(budget_id, |budget, version| {
            let row = budget.months.entry(month.to_string()).or_insert_with(|| MonthRow {
                header: Month {
                    month: month.to_string(),
                    ..Default::default()
                },
                version,
                categories: VersionedTable::default(),
            });
            row.categories.upsert(category, version);
            true
        })
    }

    /// Tombstones one category balance within a month.
    pub fn delete_month_category(
        &self,
        budget_id: &str,
        month: &str,
        category_id: &str,
    ) -> SyncResult<Option<u64>> {
        self.write_if(budget_id, |budget, version| {
            budget
                .months
                .get_mut(month)
                .is_some_and(|row| row.categories.delete(category_id, version))
        })
    }

    /// Tombstones a whole month.
    pub fn delete_month(&self, budget_id: &str, month: &str) -> SyncResult<Option<u64>> {
        self.write_if(budget_id, |budget, version| match budget.months.get_mut(month) {
            Some(row) if !row.header.deleted => {
                row.header.deleted = true;
                row.version = version;
                true
            }
            _ => false,
        })
    }

    /// Renames the budget.
    pub fn rename(&self, budget_id: &str, name: &str) -> SyncResult<u64> {
        self.write(budget_id, |budget, _| {
            budget.name = name.to_string();
            true
        })
    }

    /// Makes the next delta response omit every change while still
    /// advancing knowledge, as a buggy upstream would.
    pub fn drop_next_delta_changes(&self) {
        self.drop_next_delta.store(true, Ordering::SeqCst);
    }

    /// Makes full exports fail with a server error until cleared with `None`.
    pub fn fail_full_syncs(&self, message: Option<&str>) {
        *self.full_failure.lock() = message.map(str::to_string);
    }

    /// Sets whether the server answers at all.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the number of full sync requests received.
    pub fn full_calls(&self) -> usize {
        self.full_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of delta sync requests received.
    pub fn delta_calls(&self) -> usize {
        self.delta_calls.load(Ordering::SeqCst)
    }

    fn write<F>(&self, budget_id: &str, apply: F) -> SyncResult<u64>
    where
        F: FnOnce(&mut SimulatedBudget, u64) -> bool,
    {
        self.write_if(budget_id, apply)?
            .ok_or_else(|| SyncError::Protocol(format!("write to {budget_id} was rejected")))
    }

    fn write_if<F>(&self, budget_id: &str, apply: F) -> SyncResult<Option<u64>>
    where
        F: FnOnce(&mut SimulatedBudget, u64) -> bool,
    {
        let mut budgets = self.budgets.write();
        let budget = budgets
            .get_mut(budget_id)
            .ok_or_else(|| SyncError::ReplicaNotFound(budget_id.to_string()))?;
        let version = budget.knowledge + 1;
        if apply(budget, version) {
            budget.knowledge = version;
            Ok(Some(version))
        } else {
            Ok(None)
        }
    }

    fn check_available(&self) -> SyncResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }
}

#[async_trait]
impl SyncProvider for SimulatedBudgetServer {
    async fn full_sync(&self, replica_id: &str) -> SyncResult<SnapshotResponse> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let failure = self.full_failure.lock().clone();
        if let Some(message) = failure {
            return Err(SyncError::ServerError(message));
        }

        let budgets = self.budgets.read();
        let budget = budgets
            .get(replica_id)
            .ok_or_else(|| SyncError::ReplicaNotFound(replica_id.to_string()))?;
        Ok(SnapshotResponse::new(
            budget.export(replica_id),
            budget.knowledge,
        ))
    }

    async fn delta_sync(
        &self,
        replica_id: &str,
        since_knowledge: u64,
    ) -> SyncResult<SnapshotResponse> {
        self.delta_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let budgets = self.budgets.read();
        let budget = budgets
            .get(replica_id)
            .ok_or_else(|| SyncError::ReplicaNotFound(replica_id.to_string()))?;

        let snapshot = if self.drop_next_delta.swap(false, Ordering::SeqCst) {
            BudgetSnapshot::new(replica_id, budget.name.clone())
        } else {
            budget.changes_since(replica_id, since_knowledge)
        };
        Ok(SnapshotResponse::new(snapshot, budget.knowledge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{account, category, month, sample_snapshot};

    #[tokio::test]
    async fn full_export_hides_tombstones() {
        let server = SimulatedBudgetServer::new();
        server.create_budget("b1", "Household");
        server.upsert("b1", account("a1", "Checking", 100)).unwrap();
        server.upsert("b1", account("a2", "Savings", 200)).unwrap();
        let knowledge = server.delete::<Account>("b1", "a1").unwrap();

        assert_eq!(knowledge, Some(3));
        let response = server.full_sync("b1").await.unwrap();
        assert_eq!(response.server_knowledge, 3);
        assert_eq!(response.snapshot.accounts.len(), 1);
        assert_eq!(response.snapshot.accounts[0].id, "a2");
    }

    #[tokio::test]
    async fn delta_returns_changes_and_tombstones() {
        let server = SimulatedBudgetServer::new();
        let seeded = server.seed("b1", &sample_snapshot("b1"));

        server.upsert("b1", account("a9", "Cash", 5)).unwrap();
        server.delete::<Account>("b1", "acc-checking").unwrap();

        let delta = server.delta_sync("b1", seeded).await.unwrap();
        assert_eq!(delta.server_knowledge, seeded + 2);
        let ids: Vec<_> = delta.snapshot.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a9", "acc-checking"]);
        assert!(delta.snapshot.accounts[1].deleted);
        assert!(delta.snapshot.payees.is_empty());
    }

    #[tokio::test]
    async fn month_delta_lists_only_changed_categories() {
        let server = SimulatedBudgetServer::new();
        server.create_budget("b1", "Household");
        server
            .upsert_month(
                "b1",
                month(
                    "2024-01-01",
                    vec![category("c1", "Groceries", 100), category("c2", "Rent", 900)],
                ),
            )
            .unwrap();
        let before = server.knowledge("b1").unwrap();

        server
            .upsert_month_category("b1", "2024-01-01", category("c1", "Groceries", 150))
            .unwrap();

        let delta = server.delta_sync("b1", before).await.unwrap();
        assert_eq!(delta.snapshot.months.len(), 1);
        assert_eq!(delta.snapshot.months[0].categories.len(), 1);
        assert_eq!(delta.snapshot.months[0].categories[0].budgeted, 150);

        let full = server.full_sync("b1").await.unwrap();
        assert_eq!(full.snapshot.months[0].categories.len(), 2);
    }

    #[tokio::test]
    async fn dropped_delta_advances_knowledge_without_changes() {
        let server = SimulatedBudgetServer::new();
        server.create_budget("b1", "Household");
        server.upsert("b1", account("a1", "Checking", 100)).unwrap();
        server.drop_next_delta_changes();

        let delta = server.delta_sync("b1", 0).await.unwrap();
        assert_eq!(delta.server_knowledge, 1);
        assert!(delta.snapshot.is_empty());

        let delta = server.delta_sync("b1", 0).await.unwrap();
        assert_eq!(delta.snapshot.accounts.len(), 1);
    }

    #[tokio::test]
    async fn failures_and_unknown_budgets() {
        let server = SimulatedBudgetServer::new();
        assert!(matches!(
            server.full_sync("nope").await,
            Err(SyncError::ReplicaNotFound(_))
        ));
        assert!(server.upsert("nope", account("a1", "x", 0)).is_err());

        server.create_budget("b1", "Household");
        server.fail_full_syncs(Some("503"));
        assert!(matches!(
            server.full_sync("b1").await,
            Err(SyncError::ServerError(_))
        ));
        server.fail_full_syncs(None);
        server.set_available(false);
        assert!(matches!(
            server.delta_sync("b1", 0).await,
            Err(SyncError::NotConnected)
        ));
        assert_eq!(server.full_calls(), 2);
        assert_eq!(server.delta_calls(), 1);
    }

    #[test]
    fn deleting_missing_record_keeps_knowledge() {
        let server = SimulatedBudgetServer::new();
        server.create_budget("b1", "Household");

        assert_eq!(server.delete::<Payee>("b1", "p1").unwrap(), None);
        assert_eq!(server.knowledge("b1"), Some(0));
        assert_eq!(server.delete_month("b1", "2024-01-01").unwrap(), None);
    }
}
