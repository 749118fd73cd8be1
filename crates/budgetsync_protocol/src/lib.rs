//! # BudgetSync Protocol
//!
//! Entity records and snapshot payloads for BudgetSync.
//!
//! This crate provides:
//! - Record types for every budget collection (accounts, categories, months, ...)
//! - `Entity`, `NamedEntity` and `ChildEntity` traits used by merge and indexing
//! - `BudgetSnapshot`, the payload shape shared by full and delta responses
//! - `SnapshotResponse`, a payload paired with its server knowledge token
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entity;
mod month;
mod records;
mod snapshot;

pub use entity::{ChildEntity, Entity, NamedEntity};
pub use month::Month;
pub use records::{
    Account, Category, CategoryGroup, ClearedStatus, Payee, PayeeLocation,
    ScheduledSubtransaction, ScheduledTransaction, Subtransaction, Transaction,
};
pub use snapshot::{null_as_empty, BudgetSnapshot, SnapshotResponse, SyncKind};
