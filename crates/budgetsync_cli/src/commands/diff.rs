//! Diff command implementation.

use super::{load_response, replica_id, CommandResult};
use budgetsync_engine::{build_replica, compare_replicas, DifferenceKind, DriftResult};
use std::path::Path;

/// Compares two payload files the way the drift check compares replicas.
pub fn diff(merged: &Path, truth: &Path) -> CommandResult<DriftResult> {
    let merged_response = load_response(merged)?;
    let truth_response = load_response(truth)?;

    let merged_replica = build_replica(
        replica_id(&merged_response, merged),
        merged_response.snapshot,
        merged_response.server_knowledge,
    );
    let truth_replica = build_replica(
        replica_id(&truth_response, truth),
        truth_response.snapshot,
        truth_response.server_knowledge,
    );

    Ok(compare_replicas(&merged_replica, &truth_replica)?)
}

/// Runs the diff command. Returns true if drift was found.
pub fn run(merged: &Path, truth: &Path, format: &str) -> CommandResult<bool> {
    let result = diff(merged, truth)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(result.has_drift)
}

fn print_text_output(result: &DriftResult) {
    println!("Drift: {result}");
    if result.knowledge_mismatch {
        println!(
            "Knowledge: merged {} vs truth {}",
            result.merged_knowledge, result.truth_knowledge
        );
    }
    for difference in &result.differences {
        let label = match difference.kind {
            DifferenceKind::MissingFromMerged => "missing",
            DifferenceKind::ExtraInMerged => "extra",
            DifferenceKind::ValueChanged => "changed",
            DifferenceKind::ArrayItem { .. } => "item",
        };
        let show = |value: &Option<serde_json::Value>| {
            value
                .as_ref()
                .map_or_else(|| "-".to_string(), |v| v.to_string())
        };
        println!(
            "  {label:<8} {}: {} -> {}",
            difference.path,
            show(&difference.merged),
            show(&difference.truth)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetsync_protocol::SnapshotResponse;
    use budgetsync_testkit::{account, sample_snapshot, TempPayloadDir};

    #[test]
    fn identical_payloads_do_not_drift() {
        let dir = TempPayloadDir::new();
        let merged = dir.write_json("merged.json", &SnapshotResponse::new(sample_snapshot("b1"), 5));
        let mut reordered = sample_snapshot("b1");
        reordered.accounts.reverse();
        reordered.months.reverse();
        let truth = dir.write_json("truth.json", &SnapshotResponse::new(reordered, 5));

        let result = diff(&merged, &truth).unwrap();
        assert!(!result.has_drift);
        assert!(!run(&merged, &truth, "text").unwrap());
    }

    #[test]
    fn reports_changed_and_missing_records() {
        let dir = TempPayloadDir::new();
        let merged = dir.write_json("merged.json", &SnapshotResponse::new(sample_snapshot("b1"), 5));
        let mut truth = sample_snapshot("b1");
        truth.accounts[0].balance += 1;
        truth.accounts.push(account("acc-cash", "Cash", 1));
        let truth = dir.write_json("truth.json", &SnapshotResponse::new(truth, 6));

        let result = diff(&merged, &truth).unwrap();

        assert!(result.has_drift);
        assert_eq!(result.summary["accounts"], 2);
        assert!(result.knowledge_mismatch);
        assert!(result
            .differences
            .iter()
            .any(|d| d.kind == DifferenceKind::MissingFromMerged
                && d.path.to_string() == "accounts[acc-cash]"));
        assert!(run(&merged, &truth, "json").unwrap());
    }
}
