//! Inspect command implementation.

use super::{load_response, replica_id, CommandResult};
use budgetsync_engine::{build_replica, ReplicaSummary};
use serde::Serialize;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Payload file.
    pub path: String,
    /// Replica built from the payload.
    pub summary: ReplicaSummary,
    /// Records in the payload, tombstones included.
    pub payload_records: usize,
    /// Records kept in the replica.
    pub replica_records: usize,
    /// Name index entries shadowed by a later record with the same name.
    pub name_collisions: usize,
}

/// Builds a replica from the payload at `path` and summarizes it.
pub fn inspect(path: &Path) -> CommandResult<InspectResult> {
    let response = load_response(path)?;
    let id = replica_id(&response, path);
    let payload_records = response.snapshot.record_count();

    let replica = build_replica(id, response.snapshot, response.server_knowledge);
    let summary = replica.summary();

    Ok(InspectResult {
        path: path.display().to_string(),
        replica_records: summary.collections.values().sum(),
        name_collisions: replica.index().name_collisions(),
        payload_records,
        summary,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let result = inspect(path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let summary = &result.summary;
    println!("BudgetSync Snapshot Inspection");
    println!("==============================");
    println!();
    println!("Path:      {}", result.path);
    println!("Budget:    {} ({})", summary.name, summary.id);
    println!("Knowledge: {}", summary.server_knowledge);
    println!();
    println!("Collections:");
    for (collection, count) in &summary.collections {
        println!("  {collection:<27} {count}");
    }
    println!();
    println!("Records:");
    println!("  In payload:      {}", result.payload_records);
    println!("  In replica:      {}", result.replica_records);
    println!("  Name collisions: {}", result.name_collisions);
}
