//! Property-based test generators using proptest.
//!
//! IDs are drawn from small pools so that generated writes keep hitting
//! the same records: updates, deletes and re-creations all happen.

use crate::simulator::SimulatedBudgetServer;
use budgetsync_engine::SyncResult;
use budgetsync_protocol::{
    Account, BudgetSnapshot, Category, ClearedStatus, Month, Payee, Subtransaction, Transaction,
};
use proptest::prelude::*;

/// Month keys used by generated data.
pub const MONTH_KEYS: &[&str] = &["2024-01-01", "2024-02-01", "2024-03-01"];

const ID_POOL: u32 = 6;

/// Strategy for IDs of the form `<prefix><n>` from a pool of six.
pub fn id_strategy(prefix: &'static str) -> impl Strategy<Value = String> {
    (0..ID_POOL).prop_map(move |n| format!("{prefix}{n}"))
}

/// Strategy for display names. Collisions across records are likely.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,5}( [A-Z][a-z]{1,5})?").expect("Invalid regex")
}

/// Strategy for milliunit amounts.
pub fn amount_strategy() -> impl Strategy<Value = i64> {
    -5_000_000i64..5_000_000
}

/// Strategy for month keys.
pub fn month_key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(MONTH_KEYS).prop_map(str::to_string)
}

/// Strategy for live accounts.
pub fn account_strategy() -> impl Strategy<Value = Account> {
    (id_strategy("acc"), name_strategy(), amount_strategy(), any::<bool>()).prop_map(
        |(id, name, balance, closed)| Account {
            id,
            name,
            kind: "checking".into(),
            on_budget: true,
            closed,
            balance,
            cleared_balance: balance,
            ..Default::default()
        },
    )
}

/// Strategy for live payees.
pub fn payee_strategy() -> impl Strategy<Value = Payee> {
    (id_strategy("pay"), name_strategy()).prop_map(|(id, name)| Payee {
        id,
        name,
        ..Default::default()
    })
}

/// Strategy for live categories.
pub fn category_strategy() -> impl Strategy<Value = Category> {
    (
        id_strategy("cat"),
        name_strategy(),
        amount_strategy(),
        amount_strategy(),
    )
        .prop_map(|(id, name, budgeted, activity)| Category {
            id,
            name,
            budgeted,
            activity,
            balance: budgeted + activity,
            ..Default::default()
        })
}

/// Strategy for live transactions.
pub fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    (
        id_strategy("txn"),
        id_strategy("acc"),
        proptest::option::of(id_strategy("pay")),
        amount_strategy(),
        prop::sample::select(vec![
            ClearedStatus::Cleared,
            ClearedStatus::Uncleared,
            ClearedStatus::Reconciled,
        ]),
    )
        .prop_map(|(id, account_id, payee_id, amount, cleared)| Transaction {
            id,
            date: "2024-01-15".into(),
            amount,
            cleared,
            account_id,
            payee_id,
            ..Default::default()
        })
}

/// Strategy for live subtransactions.
pub fn subtransaction_strategy() -> impl Strategy<Value = Subtransaction> {
    (id_strategy("sub"), id_strategy("txn"), amount_strategy()).prop_map(
        |(id, transaction_id, amount)| Subtransaction {
            id,
            transaction_id: Some(transaction_id),
            amount,
            ..Default::default()
        },
    )
}

/// Strategy for months with a handful of categories.
pub fn month_strategy() -> impl Strategy<Value = Month> {
    (
        month_key_strategy(),
        prop::collection::vec(category_strategy(), 0..4),
    )
        .prop_map(|(month, categories)| Month {
            month,
            budgeted: categories.iter().map(|c| c.budgeted).sum(),
            categories,
            ..Default::default()
        })
}

/// Strategy for budget snapshots without tombstones.
pub fn snapshot_strategy() -> impl Strategy<Value = BudgetSnapshot> {
    (
        prop::collection::vec(account_strategy(), 0..5),
        prop::collection::vec(payee_strategy(), 0..5),
        prop::collection::vec(category_strategy(), 0..5),
        prop::collection::vec(month_strategy(), 0..3),
        prop::collection::vec(transaction_strategy(), 0..6),
        prop::collection::vec(subtransaction_strategy(), 0..4),
    )
        .prop_map(
            |(accounts, payees, categories, months, transactions, subtransactions)| {
                let mut snapshot = BudgetSnapshot::new("budget", "Generated");
                snapshot.accounts = accounts;
                snapshot.payees = payees;
                snapshot.categories = categories;
                snapshot.months = months;
                snapshot.transactions = transactions;
                snapshot.subtransactions = subtransactions;
                snapshot
            },
        )
}

/// One server-side write.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert or replace an account.
    UpsertAccount(Account),
    /// Tombstone an account.
    DeleteAccount(String),
    /// Insert or replace a payee.
    UpsertPayee(Payee),
    /// Tombstone a payee.
    DeletePayee(String),
    /// Insert or replace a category.
    UpsertCategory(Category),
    /// Tombstone a category.
    DeleteCategory(String),
    /// Insert or replace a transaction.
    UpsertTransaction(Transaction),
    /// Tombstone a transaction.
    DeleteTransaction(String),
    /// Insert or replace a subtransaction.
    UpsertSubtransaction(Subtransaction),
    /// Tombstone a subtransaction.
    DeleteSubtransaction(String),
    /// Insert or replace one category balance in a month.
    SetMonthCategory {
        /// Month key.
        month: String,
        /// Category balance.
        category: Category,
    },
    /// Tombstone one category balance in a month.
    DeleteMonthCategory {
        /// Month key.
        month: String,
        /// Category ID.
        category_id: String,
    },
    /// Tombstone a month.
    DeleteMonth(String),
    /// Rename the budget.
    RenameBudget(String),
}

impl Mutation {
    /// Applies this write to `budget_id` on `server`. Deletes of records
    /// that do not exist are no-ops.
    pub fn apply(&self, server: &SimulatedBudgetServer, budget_id: &str) -> SyncResult<()> {
        match self {
            Self::UpsertAccount(record) => server.upsert(budget_id, record.clone()).map(drop),
            Self::DeleteAccount(id) => server.delete::<Account>(budget_id, id).map(drop),
            Self::UpsertPayee(record) => server.upsert(budget_id, record.clone()).map(drop),
            Self::DeletePayee(id) => server.delete::<Payee>(budget_id, id).map(drop),
            Self::UpsertCategory(record) => server.upsert(budget_id, record.clone()).map(drop),
            Self::DeleteCategory(id) => server.delete::<Category>(budget_id, id).map(drop),
            Self::UpsertTransaction(record) => server.upsert(budget_id, record.clone()).map(drop),
            Self::DeleteTransaction(id) => server.delete::<Transaction>(budget_id, id).map(drop),
            Self::UpsertSubtransaction(record) => {
                server.upsert(budget_id, record.clone()).map(drop)
            }
            Self::DeleteSubtransaction(id) => {
                server.delete::<Subtransaction>(budget_id, id).map(drop)
            }
            Self::SetMonthCategory { month, category } => server
                .upsert_month_category(budget_id, month, category.clone())
                .map(drop),
            Self::DeleteMonthCategory { month, category_id } => server
                .delete_month_category(budget_id, month, category_id)
                .map(drop),
            Self::DeleteMonth(month) => server.delete_month(budget_id, month).map(drop),
            Self::RenameBudget(name) => server.rename(budget_id, name).map(drop),
        }
    }
}

/// Strategy for single server-side writes.
pub fn mutation_strategy() -> impl Strategy<Value = Mutation> {
    let records = prop_oneof![
        3 => account_strategy().prop_map(Mutation::UpsertAccount),
        1 => id_strategy("acc").prop_map(Mutation::DeleteAccount),
        2 => payee_strategy().prop_map(Mutation::UpsertPayee),
        1 => id_strategy("pay").prop_map(Mutation::DeletePayee),
        2 => category_strategy().prop_map(Mutation::UpsertCategory),
        1 => id_strategy("cat").prop_map(Mutation::DeleteCategory),
        3 => transaction_strategy().prop_map(Mutation::UpsertTransaction),
        1 => id_strategy("txn").prop_map(Mutation::DeleteTransaction),
        2 => subtransaction_strategy().prop_map(Mutation::UpsertSubtransaction),
        1 => id_strategy("sub").prop_map(Mutation::DeleteSubtransaction),
    ];
    let months = prop_oneof![
        3 => (month_key_strategy(), category_strategy())
            .prop_map(|(month, category)| Mutation::SetMonthCategory { month, category }),
        1 => (month_key_strategy(), id_strategy("cat"))
            .prop_map(|(month, category_id)| Mutation::DeleteMonthCategory { month, category_id }),
        1 => month_key_strategy().prop_map(Mutation::DeleteMonth),
        1 => name_strategy().prop_map(Mutation::RenameBudget),
    ];
    prop_oneof![17 => records, 6 => months]
}

/// Strategy for up to `max_batches` batches of writes, one batch per sync.
pub fn mutation_batches_strategy(max_batches: usize) -> impl Strategy<Value = Vec<Vec<Mutation>>> {
    prop::collection::vec(prop::collection::vec(mutation_strategy(), 0..8), 1..=max_batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn ids_stay_in_pool() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let id = id_strategy("acc")
                .new_tree(&mut runner)
                .unwrap()
                .current();
            let n: u32 = id.trim_start_matches("acc").parse().unwrap();
            assert!(n < ID_POOL);
        }
    }

    proptest! {
        #[test]
        fn generated_snapshots_have_no_tombstones(snapshot in snapshot_strategy()) {
            prop_assert!(snapshot.accounts.iter().all(|a| !a.deleted));
            prop_assert!(snapshot.months.iter().all(|m| MONTH_KEYS.contains(&m.month.as_str())));
        }

        #[test]
        fn mutations_apply_to_existing_budget(mutations in prop::collection::vec(mutation_strategy(), 0..20)) {
            let server = SimulatedBudgetServer::new();
            server.create_budget("b1", "Household");
            for mutation in &mutations {
                prop_assert!(mutation.apply(&server, "b1").is_ok());
            }
            prop_assert!(server.knowledge("b1").unwrap() <= mutations.len() as u64);
        }
    }
}
