//! Record builders and sample budgets.
//!
//! Builders fill the fields tests usually assert on and leave the rest at
//! their defaults.

use budgetsync_protocol::{
    Account, BudgetSnapshot, Category, CategoryGroup, ClearedStatus, Month, Payee, PayeeLocation,
    ScheduledSubtransaction, ScheduledTransaction, SnapshotResponse, Subtransaction, Transaction,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds an on-budget checking account.
pub fn account(id: &str, name: &str, balance: i64) -> Account {
    Account {
        id: id.into(),
        name: name.into(),
        kind: "checking".into(),
        on_budget: true,
        balance,
        cleared_balance: balance,
        ..Default::default()
    }
}

/// Builds a category group.
pub fn category_group(id: &str, name: &str) -> CategoryGroup {
    CategoryGroup {
        id: id.into(),
        name: name.into(),
        ..Default::default()
    }
}

/// Builds a category with a budgeted amount and matching balance.
pub fn category(id: &str, name: &str, budgeted: i64) -> Category {
    Category {
        id: id.into(),
        name: name.into(),
        budgeted,
        balance: budgeted,
        ..Default::default()
    }
}

/// Builds a category inside a group.
pub fn grouped_category(id: &str, group_id: &str, name: &str, budgeted: i64) -> Category {
    Category {
        category_group_id: Some(group_id.into()),
        ..category(id, name, budgeted)
    }
}

/// Builds a month holding `categories`; totals are derived from them.
pub fn month(key: &str, categories: Vec<Category>) -> Month {
    let budgeted = categories.iter().map(|c| c.budgeted).sum();
    Month {
        month: key.into(),
        budgeted,
        categories,
        ..Default::default()
    }
}

/// Builds a payee.
pub fn payee(id: &str, name: &str) -> Payee {
    Payee {
        id: id.into(),
        name: name.into(),
        ..Default::default()
    }
}

/// Builds a payee location.
pub fn payee_location(id: &str, payee_id: &str) -> PayeeLocation {
    PayeeLocation {
        id: id.into(),
        payee_id: Some(payee_id.into()),
        latitude: "52.37".into(),
        longitude: "4.89".into(),
        ..Default::default()
    }
}

/// Builds a cleared transaction.
pub fn transaction(id: &str, account_id: &str, amount: i64) -> Transaction {
    Transaction {
        id: id.into(),
        date: "2024-01-15".into(),
        amount,
        cleared: ClearedStatus::Cleared,
        approved: true,
        account_id: account_id.into(),
        ..Default::default()
    }
}

/// Builds a subtransaction of `transaction_id`.
pub fn subtransaction(id: &str, transaction_id: &str, amount: i64) -> Subtransaction {
    Subtransaction {
        id: id.into(),
        transaction_id: Some(transaction_id.into()),
        amount,
        ..Default::default()
    }
}

/// Builds a monthly scheduled transaction.
pub fn scheduled_transaction(id: &str, account_id: &str, amount: i64) -> ScheduledTransaction {
    ScheduledTransaction {
        id: id.into(),
        date_first: "2024-01-01".into(),
        date_next: "2024-03-01".into(),
        frequency: "monthly".into(),
        amount,
        account_id: account_id.into(),
        ..Default::default()
    }
}

/// Builds a scheduled subtransaction of `scheduled_transaction_id`.
pub fn scheduled_subtransaction(
    id: &str,
    scheduled_transaction_id: &str,
    amount: i64,
) -> ScheduledSubtransaction {
    ScheduledSubtransaction {
        id: id.into(),
        scheduled_transaction_id: Some(scheduled_transaction_id.into()),
        amount,
        ..Default::default()
    }
}

/// A small household budget with at least one record in every collection.
pub fn sample_snapshot(budget_id: &str) -> BudgetSnapshot {
    let rent = grouped_category("cat-rent", "grp-bills", "Rent", 1_200_000);
    let groceries = grouped_category("cat-groceries", "grp-everyday", "Groceries", 400_000);
    let dining = grouped_category("cat-dining", "grp-everyday", "Dining Out", 150_000);

    let mut snapshot = BudgetSnapshot::new(budget_id, "Household");
    snapshot.accounts = vec![
        account("acc-checking", "Checking", 2_500_000),
        account("acc-savings", "Savings", 10_000_000),
    ];
    snapshot.category_groups = vec![
        category_group("grp-bills", "Bills"),
        category_group("grp-everyday", "Everyday"),
    ];
    snapshot.categories = vec![rent.clone(), groceries.clone(), dining.clone()];
    snapshot.months = vec![
        month(
            "2024-01-01",
            vec![rent.clone(), groceries.clone(), dining.clone()],
        ),
        month("2024-02-01", vec![rent, groceries, dining]),
    ];
    snapshot.payees = vec![
        payee("pay-landlord", "Landlord"),
        payee("pay-market", "Market"),
    ];
    snapshot.payee_locations = vec![payee_location("loc-market", "pay-market")];
    snapshot.transactions = vec![
        Transaction {
            payee_id: Some("pay-landlord".into()),
            category_id: Some("cat-rent".into()),
            ..transaction("txn-rent", "acc-checking", -1_200_000)
        },
        Transaction {
            payee_id: Some("pay-market".into()),
            ..transaction("txn-split", "acc-checking", -85_000)
        },
    ];
    snapshot.subtransactions = vec![
        Subtransaction {
            category_id: Some("cat-groceries".into()),
            ..subtransaction("sub-groceries", "txn-split", -60_000)
        },
        Subtransaction {
            category_id: Some("cat-dining".into()),
            ..subtransaction("sub-dining", "txn-split", -25_000)
        },
    ];
    snapshot.scheduled_transactions =
        vec![scheduled_transaction("sch-rent", "acc-checking", -1_200_000)];
    snapshot.scheduled_subtransactions =
        vec![scheduled_subtransaction("ssub-rent", "sch-rent", -1_200_000)];
    snapshot
}

/// [`sample_snapshot`] paired with a knowledge value.
pub fn sample_response(budget_id: &str, server_knowledge: u64) -> SnapshotResponse {
    SnapshotResponse::new(sample_snapshot(budget_id), server_knowledge)
}

/// A temporary directory for JSON payload files, removed on drop.
pub struct TempPayloadDir {
    dir: TempDir,
}

impl TempPayloadDir {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Serializes `value` as JSON into `name` and returns the file path.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> PathBuf {
        let path = self.dir.path().join(name);
        let json = serde_json::to_vec_pretty(value).expect("Failed to serialize payload");
        std::fs::write(&path, json).expect("Failed to write payload");
        path
    }
}

impl Default for TempPayloadDir {
    fn default() -> Self {
        Self::new()
    }
}
