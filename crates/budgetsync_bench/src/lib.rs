//! Shared data builders for BudgetSync benchmarks.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use budgetsync_protocol::{BudgetSnapshot, Transaction};
use budgetsync_testkit::{account, category, month, payee, subtransaction, transaction};
use rand::Rng;

/// Builds a snapshot with `size` transactions and proportional other collections.
pub fn random_snapshot(size: usize) -> BudgetSnapshot {
    let mut rng = rand::thread_rng();
    let accounts = (size / 100).max(1);
    let payees = (size / 20).max(1);
    let categories = (size / 50).max(1);

    let mut snapshot = BudgetSnapshot::new("bench", "Benchmark Budget");
    snapshot.accounts = (0..accounts)
        .map(|i| account(&format!("acc-{i}"), &format!("Account {i}"), rng.gen_range(0..10_000_000)))
        .collect();
    snapshot.payees = (0..payees)
        .map(|i| payee(&format!("pay-{i}"), &format!("Payee {i}")))
        .collect();
    snapshot.categories = (0..categories)
        .map(|i| category(&format!("cat-{i}"), &format!("Category {i}"), rng.gen_range(0..1_000_000)))
        .collect();
    snapshot.months = (1..=12)
        .map(|m| month(&format!("2024-{m:02}-01"), snapshot.categories.clone()))
        .collect();
    snapshot.transactions = (0..size)
        .map(|i| Transaction {
            payee_id: Some(format!("pay-{}", rng.gen_range(0..payees))),
            ..transaction(
                &format!("txn-{i}"),
                &format!("acc-{}", rng.gen_range(0..accounts)),
                rng.gen_range(-1_000_000..1_000_000),
            )
        })
        .collect();
    snapshot.subtransactions = (0..size / 10)
        .map(|i| {
            subtransaction(
                &format!("sub-{i}"),
                &format!("txn-{}", rng.gen_range(0..size.max(1))),
                rng.gen_range(-100_000..0),
            )
        })
        .collect();
    snapshot
}

/// Builds a delta that updates, adds and deletes about `changes` records
/// of a [`random_snapshot`] of `size`.
pub fn random_delta(size: usize, changes: usize) -> BudgetSnapshot {
    let mut rng = rand::thread_rng();
    let mut delta = BudgetSnapshot::new("bench", "");

    delta.transactions = (0..changes)
        .map(|i| {
            let existing = rng.gen_range(0..size.max(1));
            let mut record = match i % 3 {
                // Append new records past the end of the base.
                0 => transaction(&format!("txn-{}", size + i), "acc-0", rng.gen_range(-1_000..1_000)),
                _ => transaction(&format!("txn-{existing}"), "acc-0", rng.gen_range(-1_000..1_000)),
            };
            record.deleted = i % 3 == 2;
            record
        })
        .collect();
    delta.months = vec![month(
        "2024-06-01",
        (0..changes.min(10))
            .map(|i| category(&format!("cat-{i}"), &format!("Category {i}"), rng.gen_range(0..1_000_000)))
            .collect(),
    )];
    delta
}
