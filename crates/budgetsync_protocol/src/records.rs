//! Identifier-keyed budget records.
//!
//! Amounts are integer milliunits. Every struct decodes leniently: missing
//! fields take their default so that sparse upstream payloads still load.

use crate::entity::impl_entity;
use serde::{Deserialize, Serialize};

/// An account (checking, savings, credit card, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    /// Account ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Account type as reported upstream (e.g. `checking`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the account is on budget.
    pub on_budget: bool,
    /// Whether the account is closed.
    pub closed: bool,
    /// Free-form note.
    pub note: Option<String>,
    /// Current balance.
    pub balance: i64,
    /// Cleared balance.
    pub cleared_balance: i64,
    /// Uncleared balance.
    pub uncleared_balance: i64,
    /// Payee used for transfers into this account.
    pub transfer_payee_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(Account, "accounts", named);

/// A group of categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryGroup {
    /// Group ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the group is hidden.
    pub hidden: bool,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(CategoryGroup, "category_groups", named);

/// A budget category, either top-level or embedded in a [`Month`](crate::Month).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    /// Category ID.
    pub id: String,
    /// Owning group ID.
    pub category_group_id: Option<String>,
    /// Owning group name, when the upstream includes it.
    pub category_group_name: Option<String>,
    /// Display name.
    pub name: String,
    /// Whether the category is hidden.
    pub hidden: bool,
    /// Group the category belonged to before being hidden.
    pub original_category_group_id: Option<String>,
    /// Free-form note.
    pub note: Option<String>,
    /// Amount budgeted.
    pub budgeted: i64,
    /// Activity amount.
    pub activity: i64,
    /// Available balance.
    pub balance: i64,
    /// Goal type code.
    pub goal_type: Option<String>,
    /// Goal target amount.
    pub goal_target: Option<i64>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(Category, "categories", named);

/// A payee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payee {
    /// Payee ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Account this payee transfers into, for transfer payees.
    pub transfer_account_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(Payee, "payees", named);

/// A geographic location recorded for a payee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayeeLocation {
    /// Location ID.
    pub id: String,
    /// Payee ID.
    pub payee_id: Option<String>,
    /// Latitude as delivered upstream.
    pub latitude: String,
    /// Longitude as delivered upstream.
    pub longitude: String,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(PayeeLocation, "payee_locations", child = payee_id);

/// Cleared state of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearedStatus {
    /// Cleared by the bank.
    Cleared,
    /// Not yet cleared.
    #[default]
    Uncleared,
    /// Reconciled.
    Reconciled,
}

/// A transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    /// Transaction ID.
    pub id: String,
    /// Transaction date (`YYYY-MM-DD`).
    pub date: String,
    /// Amount.
    pub amount: i64,
    /// Memo.
    pub memo: Option<String>,
    /// Cleared state.
    pub cleared: ClearedStatus,
    /// Whether the transaction is approved.
    pub approved: bool,
    /// Flag color.
    pub flag_color: Option<String>,
    /// Account ID.
    pub account_id: String,
    /// Payee ID.
    pub payee_id: Option<String>,
    /// Category ID.
    pub category_id: Option<String>,
    /// Transfer account ID, for transfers.
    pub transfer_account_id: Option<String>,
    /// Counterpart transaction ID, for transfers.
    pub transfer_transaction_id: Option<String>,
    /// Matched import transaction ID.
    pub matched_transaction_id: Option<String>,
    /// Import ID.
    pub import_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(Transaction, "transactions");

/// One split of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subtransaction {
    /// Subtransaction ID.
    pub id: String,
    /// Parent transaction ID.
    pub transaction_id: Option<String>,
    /// Amount.
    pub amount: i64,
    /// Memo.
    pub memo: Option<String>,
    /// Payee ID.
    pub payee_id: Option<String>,
    /// Category ID.
    pub category_id: Option<String>,
    /// Transfer account ID.
    pub transfer_account_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(Subtransaction, "subtransactions", child = transaction_id);

/// A scheduled (recurring) transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledTransaction {
    /// Scheduled transaction ID.
    pub id: String,
    /// First occurrence date.
    pub date_first: String,
    /// Next occurrence date.
    pub date_next: String,
    /// Recurrence frequency (e.g. `monthly`).
    pub frequency: String,
    /// Amount.
    pub amount: i64,
    /// Memo.
    pub memo: Option<String>,
    /// Flag color.
    pub flag_color: Option<String>,
    /// Account ID.
    pub account_id: String,
    /// Payee ID.
    pub payee_id: Option<String>,
    /// Category ID.
    pub category_id: Option<String>,
    /// Transfer account ID.
    pub transfer_account_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(ScheduledTransaction, "scheduled_transactions");

/// One split of a scheduled transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledSubtransaction {
    /// Scheduled subtransaction ID.
    pub id: String,
    /// Parent scheduled transaction ID.
    pub scheduled_transaction_id: Option<String>,
    /// Amount.
    pub amount: i64,
    /// Memo.
    pub memo: Option<String>,
    /// Payee ID.
    pub payee_id: Option<String>,
    /// Category ID.
    pub category_id: Option<String>,
    /// Transfer account ID.
    pub transfer_account_id: Option<String>,
    /// Tombstone flag.
    pub deleted: bool,
}

impl_entity!(
    ScheduledSubtransaction,
    "scheduled_subtransactions",
    child = scheduled_transaction_id
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChildEntity, Entity, NamedEntity};

    #[test]
    fn account_decodes_type_field() {
        let account: Account = serde_json::from_str(
            r#"{"id":"a1","name":"Checking","type":"checking","balance":1500,"deleted":false}"#,
        )
        .unwrap();

        assert_eq!(account.kind, "checking");
        assert_eq!(account.balance, 1500);
        assert_eq!(account.name(), "Checking");
        assert!(!account.is_deleted());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let payee: Payee = serde_json::from_str(r#"{"id":"p1"}"#).unwrap();
        assert_eq!(payee.id, "p1");
        assert_eq!(payee.name, "");
        assert!(!payee.deleted);
        assert!(payee.transfer_account_id.is_none());
    }

    #[test]
    fn cleared_status_is_lowercase() {
        let txn: Transaction =
            serde_json::from_str(r#"{"id":"t1","cleared":"reconciled","amount":-2500}"#).unwrap();
        assert_eq!(txn.cleared, ClearedStatus::Reconciled);

        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["cleared"], "reconciled");
    }

    #[test]
    fn child_parent_ids() {
        let sub = Subtransaction {
            id: "s1".into(),
            transaction_id: Some("t1".into()),
            ..Default::default()
        };
        assert_eq!(sub.parent_id(), Some("t1"));

        let orphan = ScheduledSubtransaction::default();
        assert_eq!(orphan.parent_id(), None);
    }

    #[test]
    fn set_deleted_marks_tombstone() {
        let mut group = CategoryGroup {
            id: "g1".into(),
            name: "Bills".into(),
            ..Default::default()
        };
        group.set_deleted(true);
        assert!(group.is_deleted());
        assert_eq!(CategoryGroup::COLLECTION, "category_groups");
    }
}
