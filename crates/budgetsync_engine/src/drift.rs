//! Drift detection between a delta-merged replica and a full export.
//!
//! Both replicas are normalized into JSON values before comparison:
//!
//! - derived indices are not serialized at all
//! - server knowledge, sync time and the dirty flag are dropped; knowledge
//!   is reported separately since writes between the two fetches can
//!   legitimately move it
//! - every array of keyed records (by `id`, or `month` for months) is sorted
//!   by key, recursively, because full and delta responses do not promise
//!   any element order
//!
//! Keyed arrays are then compared record by record, so a missing account
//! shows up as one difference rather than a cascade of shifted positions.

use crate::error::SyncResult;
use crate::replica::LocalReplica;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Replica fields that are metadata rather than content.
const VOLATILE_FIELDS: &[&str] = &["server_knowledge", "last_synced_at", "needs_sync"];

/// One step in a path into a normalized replica.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field.
    Field(String),
    /// Record in a keyed array, by natural key.
    Key(String),
    /// Array position, for arrays without natural keys.
    Index(usize),
}

/// Location of a difference, e.g. `months[2024-01-01].categories[c1].budgeted`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPath(pub Vec<PathSegment>);

impl DiffPath {
    /// Returns the top-level collection this path points into.
    pub fn collection(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }
}

impl fmt::Display for DiffPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Key(key) => write!(f, "[{key}]")?,
                PathSegment::Index(index) => write!(f, "[#{index}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for DiffPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which side of the comparison holds a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// The delta-merged replica.
    Merged,
    /// The full export.
    Truth,
}

/// Classification of a difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifferenceKind {
    /// Present in the full export, missing from the merged replica.
    MissingFromMerged,
    /// Present in the merged replica, absent from the full export.
    ExtraInMerged,
    /// Present on both sides with different values.
    ValueChanged,
    /// An array position that exists on one side only.
    ArrayItem {
        /// Array position.
        index: usize,
        /// Side that has the item.
        present_in: Side,
    },
}

/// One structural difference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Difference {
    /// Classification.
    #[serde(flatten)]
    pub kind: DifferenceKind,
    /// Location.
    pub path: DiffPath,
    /// Value in the merged replica.
    pub merged: Option<Value>,
    /// Value in the full export.
    pub truth: Option<Value>,
}

/// Outcome of comparing a merged replica against a full export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftResult {
    /// True if any content difference was found.
    pub has_drift: bool,
    /// Number of differences.
    pub difference_count: usize,
    /// Difference count per top-level collection.
    pub summary: BTreeMap<String, usize>,
    /// Every difference, in path order.
    pub differences: Vec<Difference>,
    /// True if the two replicas carry different server knowledge.
    /// Informational only; never counted as drift.
    pub knowledge_mismatch: bool,
    /// Knowledge of the merged replica.
    pub merged_knowledge: u64,
    /// Knowledge of the full export.
    pub truth_knowledge: u64,
}

impl DriftResult {
    fn from_differences(differences: Vec<Difference>, merged: u64, truth: u64) -> Self {
        let mut summary = BTreeMap::new();
        for difference in &differences {
            let collection = difference.path.collection().unwrap_or("(root)");
            *summary.entry(collection.to_string()).or_insert(0) += 1;
        }

        Self {
            has_drift: !differences.is_empty(),
            difference_count: differences.len(),
            summary,
            differences,
            knowledge_mismatch: merged != truth,
            merged_knowledge: merged,
            truth_knowledge: truth,
        }
    }
}

impl fmt::Display for DriftResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_drift {
            return write!(f, "no drift");
        }
        write!(f, "{} differences (", self.difference_count)?;
        for (i, (collection, count)) in self.summary.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{collection}: {count}")?;
        }
        write!(f, ")")
    }
}

/// Compares a delta-merged replica against a replica built from a full export.
pub fn compare_replicas(merged: &LocalReplica, truth: &LocalReplica) -> SyncResult<DriftResult> {
    let left = normalize_replica(merged)?;
    let right = normalize_replica(truth)?;

    let mut differences = Vec::new();
    diff_values(&DiffPath::default(), &left, &right, &mut differences);

    Ok(DriftResult::from_differences(
        differences,
        merged.server_knowledge,
        truth.server_knowledge,
    ))
}

/// Converts a replica into the order-insensitive form used for comparison.
pub fn normalize_replica(replica: &LocalReplica) -> SyncResult<Value> {
    let mut value = serde_json::to_value(replica)?;
    if let Value::Object(map) = &mut value {
        for field in VOLATILE_FIELDS {
            map.remove(*field);
        }
    }
    sort_keyed_arrays(&mut value);
    Ok(value)
}

fn natural_key(value: &Value) -> Option<&str> {
    let object = value.as_object()?;
    object
        .get("id")
        .and_then(Value::as_str)
        .or_else(|| object.get("month").and_then(Value::as_str))
}

fn is_keyed(items: &[Value]) -> bool {
    items.iter().all(|item| natural_key(item).is_some())
}

fn sort_keyed_arrays(value: &mut Value) {
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                sort_keyed_arrays(item);
            }
            if is_keyed(items) {
                items.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
            }
        }
        Value::Object(map) => {
            for (_, child) in map.iter_mut() {
                sort_keyed_arrays(child);
            }
        }
        _ => {}
    }
}

fn diff_values(path: &DiffPath, merged: &Value, truth: &Value, out: &mut Vec<Difference>) {
    match (merged, truth) {
        (Value::Object(left), Value::Object(right)) => diff_objects(path, left, right, out),
        (Value::Array(left), Value::Array(right)) => {
            match (keyed_records(left), keyed_records(right)) {
                (Some(left), Some(right)) => diff_keyed(path, &left, &right, out),
                _ => diff_positional(path, left, right, out),
            }
        }
        (left, right) if left == right => {}
        (left, right) => out.push(Difference {
            kind: DifferenceKind::ValueChanged,
            path: path.clone(),
            merged: Some(left.clone()),
            truth: Some(right.clone()),
        }),
    }
}

fn diff_objects(
    path: &DiffPath,
    left: &Map<String, Value>,
    right: &Map<String, Value>,
    out: &mut Vec<Difference>,
) {
    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    for key in keys {
        let child = path.child(PathSegment::Field(key.clone()));
        match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) => diff_values(&child, l, r, out),
            (None, Some(r)) => out.push(missing(child, r)),
            (Some(l), None) => out.push(extra(child, l)),
            (None, None) => {}
        }
    }
}

/// Maps a keyed array by natural key. Returns `None` for arrays that have
/// unkeyed items or duplicate keys; those are compared by position.
fn keyed_records(items: &[Value]) -> Option<BTreeMap<&str, &Value>> {
    if !is_keyed(items) {
        return None;
    }
    let mut records = BTreeMap::new();
    for item in items {
        let key = natural_key(item)?;
        if records.insert(key, item).is_some() {
            return None;
        }
    }
    Some(records)
}

fn diff_keyed(
    path: &DiffPath,
    left: &BTreeMap<&str, &Value>,
    right: &BTreeMap<&str, &Value>,
    out: &mut Vec<Difference>,
) {
    let keys: BTreeSet<&str> = left.keys().chain(right.keys()).copied().collect();
    for key in keys {
        let child = path.child(PathSegment::Key(key.to_string()));
        match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) => diff_values(&child, l, r, out),
            (None, Some(r)) => out.push(missing(child, r)),
            (Some(l), None) => out.push(extra(child, l)),
            (None, None) => {}
        }
    }
}

fn diff_positional(path: &DiffPath, left: &[Value], right: &[Value], out: &mut Vec<Difference>) {
    let shared = left.len().min(right.len());
    for index in 0..shared {
        let child = path.child(PathSegment::Index(index));
        diff_values(&child, &left[index], &right[index], out);
    }
    for (index, item) in left.iter().enumerate().skip(shared) {
        out.push(Difference {
            kind: DifferenceKind::ArrayItem {
                index,
                present_in: Side::Merged,
            },
            path: path.clone(),
            merged: Some(item.clone()),
            truth: None,
        });
    }
    for (index, item) in right.iter().enumerate().skip(shared) {
        out.push(Difference {
            kind: DifferenceKind::ArrayItem {
                index,
                present_in: Side::Truth,
            },
            path: path.clone(),
            merged: None,
            truth: Some(item.clone()),
        });
    }
}

fn missing(path: DiffPath, truth: &Value) -> Difference {
    Difference {
        kind: DifferenceKind::MissingFromMerged,
        path,
        merged: None,
        truth: Some(truth.clone()),
    }
}

fn extra(path: DiffPath, merged: &Value) -> Difference {
    Difference {
        kind: DifferenceKind::ExtraInMerged,
        path,
        merged: Some(merged.clone()),
        truth: None,
    }
}
