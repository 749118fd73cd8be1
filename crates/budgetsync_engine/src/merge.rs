//! Entity merge engine.
//!
//! Delta payloads report the full current state of every record they
//! mention, so a delta record replaces the existing record wholesale and a
//! tombstone removes it. Months are the exception: a delta month lists only
//! the categories that changed, so its category list is merged into the
//! existing month's rather than replacing it.
//!
//! Output order is stable: surviving records keep their position, records
//! new to the collection are appended in delta order. A record tombstoned
//! and re-added within one delta counts as new and moves to the end, so
//! re-applying such a delta can reorder records without changing content.

use crate::replica::{rebuild_indices, LocalReplica};
use budgetsync_protocol::{BudgetSnapshot, Entity, Month};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Merges identifier-keyed `delta` records into `existing`.
pub fn merge_entities<E: Entity>(existing: &[E], delta: &[E]) -> Vec<E> {
    merge_keyed(
        existing,
        delta,
        |record| record.id(),
        |record| record.is_deleted(),
        |_, incoming| incoming.clone(),
        |incoming| incoming.clone(),
    )
}

/// Merges `delta` months into `existing` by month key.
///
/// A delta month that matches an existing one keeps the delta's month-level
/// fields and merges its categories into the existing month's categories.
/// A month new to the replica is taken with tombstoned categories stripped.
pub fn merge_months(existing: &[Month], delta: &[Month]) -> Vec<Month> {
    merge_keyed(
        existing,
        delta,
        |month| month.key(),
        |month| month.is_deleted(),
        |current, incoming| Month {
            categories: merge_entities(&current.categories, &incoming.categories),
            ..incoming.clone()
        },
        |incoming| Month {
            categories: merge_entities(&[], &incoming.categories),
            ..incoming.clone()
        },
    )
}

/// Applies a delta payload to a replica, producing a new replica.
///
/// The result carries `server_knowledge`, a cleared dirty flag, the given
/// sync time and a freshly rebuilt index. `existing` is left untouched.
pub fn apply_delta(
    existing: &LocalReplica,
    delta: &BudgetSnapshot,
    server_knowledge: u64,
    synced_at: DateTime<Utc>,
) -> LocalReplica {
    let name = if delta.name.is_empty() {
        existing.name.clone()
    } else {
        delta.name.clone()
    };

    let merged = LocalReplica {
        id: existing.id.clone(),
        name,
        server_knowledge,
        last_synced_at: synced_at,
        needs_sync: false,
        accounts: merge_entities(&existing.accounts, &delta.accounts),
        categories: merge_entities(&existing.categories, &delta.categories),
        category_groups: merge_entities(&existing.category_groups, &delta.category_groups),
        months: merge_months(&existing.months, &delta.months),
        payees: merge_entities(&existing.payees, &delta.payees),
        payee_locations: merge_entities(&existing.payee_locations, &delta.payee_locations),
        scheduled_transactions: merge_entities(
            &existing.scheduled_transactions,
            &delta.scheduled_transactions,
        ),
        scheduled_subtransactions: merge_entities(
            &existing.scheduled_subtransactions,
            &delta.scheduled_subtransactions,
        ),
        subtransactions: merge_entities(&existing.subtransactions, &delta.subtransactions),
        transactions: merge_entities(&existing.transactions, &delta.transactions),
        index: Default::default(),
    };

    rebuild_indices(merged)
}

/// Order-preserving keyed merge.
///
/// `update` builds the replacement for a key already present, `insert`
/// builds a record for a key seen for the first time.
fn merge_keyed<T, K, D, U, I>(
    existing: &[T],
    delta: &[T],
    key: K,
    is_deleted: D,
    update: U,
    insert: I,
) -> Vec<T>
where
    T: Clone,
    K: Fn(&T) -> &str,
    D: Fn(&T) -> bool,
    U: Fn(&T, &T) -> T,
    I: Fn(&T) -> T,
{
    let mut slots: Vec<Option<T>> = Vec::with_capacity(existing.len() + delta.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(slots.capacity());

    for record in existing {
        match positions.get(key(record)) {
            Some(&pos) => slots[pos] = Some(record.clone()),
            None => {
                positions.insert(key(record).to_string(), slots.len());
                slots.push(Some(record.clone()));
            }
        }
    }

    for incoming in delta {
        let k = key(incoming);
        if is_deleted(incoming) {
            if let Some(pos) = positions.remove(k) {
                slots[pos] = None;
            }
            continue;
        }

        match positions.get(k) {
            Some(&pos) => {
                let replacement = match &slots[pos] {
                    Some(current) => update(current, incoming),
                    None => insert(incoming),
                };
                slots[pos] = Some(replacement);
            }
            None => {
                positions.insert(k.to_string(), slots.len());
                slots.push(Some(insert(incoming)));
            }
        }
    }

    slots.into_iter().flatten().collect()
}
