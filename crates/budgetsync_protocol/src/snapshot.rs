//! Snapshot payloads.

use crate::month::Month;
use crate::records::{
    Account, Category, CategoryGroup, Payee, PayeeLocation, ScheduledSubtransaction,
    ScheduledTransaction, Subtransaction, Transaction,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Decodes an absent or `null` array as an empty `Vec`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A budget payload.
///
/// The same shape carries both a full export (every live record) and a
/// delta (only records changed since a knowledge token, tombstones
/// included).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetSnapshot {
    /// Budget ID.
    pub id: String,
    /// Budget name.
    pub name: String,
    /// Accounts.
    #[serde(deserialize_with = "null_as_empty")]
    pub accounts: Vec<Account>,
    /// Categories.
    #[serde(deserialize_with = "null_as_empty")]
    pub categories: Vec<Category>,
    /// Category groups.
    #[serde(deserialize_with = "null_as_empty")]
    pub category_groups: Vec<CategoryGroup>,
    /// Months.
    #[serde(deserialize_with = "null_as_empty")]
    pub months: Vec<Month>,
    /// Payees.
    #[serde(deserialize_with = "null_as_empty")]
    pub payees: Vec<Payee>,
    /// Payee locations.
    #[serde(deserialize_with = "null_as_empty")]
    pub payee_locations: Vec<PayeeLocation>,
    /// Scheduled transactions.
    #[serde(deserialize_with = "null_as_empty")]
    pub scheduled_transactions: Vec<ScheduledTransaction>,
    /// Scheduled subtransactions.
    #[serde(deserialize_with = "null_as_empty")]
    pub scheduled_subtransactions: Vec<ScheduledSubtransaction>,
    /// Subtransactions.
    #[serde(deserialize_with = "null_as_empty")]
    pub subtransactions: Vec<Subtransaction>,
    /// Transactions.
    #[serde(deserialize_with = "null_as_empty")]
    pub transactions: Vec<Transaction>,
}

impl BudgetSnapshot {
    /// Creates an empty snapshot for a budget.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the total number of top-level records across all collections.
    pub fn record_count(&self) -> usize {
        self.accounts.len()
            + self.categories.len()
            + self.category_groups.len()
            + self.months.len()
            + self.payees.len()
            + self.payee_locations.len()
            + self.scheduled_transactions.len()
            + self.scheduled_subtransactions.len()
            + self.subtransactions.len()
            + self.transactions.len()
    }

    /// Returns true if no collection holds a record.
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }
}

/// A payload together with the server knowledge it reflects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResponse {
    /// The budget payload.
    pub snapshot: BudgetSnapshot,
    /// Server knowledge token as of this payload.
    pub server_knowledge: u64,
}

impl SnapshotResponse {
    /// Creates a new response.
    pub fn new(snapshot: BudgetSnapshot, server_knowledge: u64) -> Self {
        Self {
            snapshot,
            server_knowledge,
        }
    }
}

/// Kind of sync that produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Full export.
    Full,
    /// Changes since a knowledge token.
    Delta,
}

impl SyncKind {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Full => "full",
            SyncKind::Delta => "delta",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn absent_and_null_arrays_are_empty() {
        let snapshot: BudgetSnapshot = serde_json::from_str(
            r#"{"id":"b1","name":"Home","accounts":null,
                "payees":[{"id":"p1","name":"Grocer"}]}"#,
        )
        .unwrap();

        assert!(snapshot.accounts.is_empty());
        assert!(snapshot.transactions.is_empty());
        assert_eq!(snapshot.payees.len(), 1);
        assert_eq!(snapshot.record_count(), 1);
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn response_decodes_from_file_shape() {
        let response: SnapshotResponse = serde_json::from_str(
            r#"{"server_knowledge":1000,"snapshot":{"id":"b1","name":"Home"}}"#,
        )
        .unwrap();
        assert_eq!(response.server_knowledge, 1000);
        assert!(response.snapshot.is_empty());
    }

    #[test]
    fn sync_kind_display() {
        assert_eq!(SyncKind::Full.to_string(), "full");
        assert_eq!(
            serde_json::to_value(SyncKind::Delta).unwrap(),
            serde_json::json!("delta")
        );
    }

    proptest! {
        #[test]
        fn record_count_sums_collections(accounts in 0usize..8, payees in 0usize..8, txns in 0usize..8) {
            let mut snapshot = BudgetSnapshot::new("b", "B");
            snapshot.accounts = (0..accounts)
                .map(|i| Account { id: format!("a{i}"), ..Default::default() })
                .collect();
            snapshot.payees = (0..payees)
                .map(|i| Payee { id: format!("p{i}"), ..Default::default() })
                .collect();
            snapshot.transactions = (0..txns)
                .map(|i| Transaction { id: format!("t{i}"), ..Default::default() })
                .collect();

            prop_assert_eq!(snapshot.record_count(), accounts + payees + txns);
            prop_assert_eq!(snapshot.is_empty(), accounts + payees + txns == 0);
        }
    }
}
