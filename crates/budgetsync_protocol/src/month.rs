//! Budget months.

use crate::records::Category;
use crate::snapshot::null_as_empty;
use serde::{Deserialize, Serialize};

/// A budget month, keyed by its `month` string rather than an identifier.
///
/// Months embed the per-month category balances. A delta month only lists
/// the categories that changed in that month, so callers merging months
/// must merge `categories` instead of replacing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Month {
    /// Month key (`YYYY-MM-DD`, first day of the month).
    pub month: String,
    /// Free-form note.
    pub note: Option<String>,
    /// Income for the month.
    pub income: i64,
    /// Total budgeted.
    pub budgeted: i64,
    /// Total activity.
    pub activity: i64,
    /// Amount left to budget.
    pub to_be_budgeted: i64,
    /// Age of money in days.
    pub age_of_money: Option<i64>,
    /// Tombstone flag.
    pub deleted: bool,
    /// Category balances for this month.
    #[serde(deserialize_with = "null_as_empty")]
    pub categories: Vec<Category>,
}

impl Month {
    /// Returns the natural key of this month.
    pub fn key(&self) -> &str {
        &self.month
    }

    /// Returns true if this month is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_categories_decode_as_empty() {
        let month: Month =
            serde_json::from_str(r#"{"month":"2024-01-01","categories":null}"#).unwrap();
        assert_eq!(month.key(), "2024-01-01");
        assert!(month.categories.is_empty());
    }

    #[test]
    fn nested_categories_decode() {
        let month: Month = serde_json::from_str(
            r#"{"month":"2024-02-01","to_be_budgeted":1000,
                "categories":[{"id":"c1","name":"Rent","budgeted":120000}]}"#,
        )
        .unwrap();
        assert_eq!(month.categories.len(), 1);
        assert_eq!(month.categories[0].budgeted, 120_000);
        assert!(!month.is_deleted());
    }
}
