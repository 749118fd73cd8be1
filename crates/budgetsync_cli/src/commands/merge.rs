//! Merge command implementation.

use super::{load_response, replica_id, CommandResult};
use budgetsync_engine::{apply_delta, build_replica};
use budgetsync_protocol::SnapshotResponse;
use chrono::Utc;
use std::path::Path;

/// Applies the delta at `delta` to the payload at `base`.
///
/// Fails if the delta's knowledge is older than the base's.
pub fn merge(base: &Path, delta: &Path) -> CommandResult<SnapshotResponse> {
    let base_response = load_response(base)?;
    let delta_response = load_response(delta)?;

    if delta_response.server_knowledge < base_response.server_knowledge {
        return Err(format!(
            "delta knowledge {} is older than base knowledge {}",
            delta_response.server_knowledge, base_response.server_knowledge
        )
        .into());
    }

    let id = replica_id(&base_response, base);
    let replica = build_replica(id, base_response.snapshot, base_response.server_knowledge);
    let merged = apply_delta(
        &replica,
        &delta_response.snapshot,
        delta_response.server_knowledge,
        Utc::now(),
    );

    tracing::info!(
        changes = delta_response.snapshot.record_count(),
        server_knowledge = merged.server_knowledge,
        "delta applied"
    );
    Ok(SnapshotResponse::new(
        merged.to_snapshot(),
        merged.server_knowledge,
    ))
}

/// Runs the merge command, writing to `output` or stdout.
pub fn run(base: &Path, delta: &Path, output: Option<&Path>) -> CommandResult<()> {
    let merged = merge(base, delta)?;
    let json = serde_json::to_string_pretty(&merged)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!(path = %path.display(), "merged snapshot written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetsync_protocol::{Account, BudgetSnapshot};
    use budgetsync_testkit::{account, sample_snapshot, TempPayloadDir};

    fn delta_response(accounts: Vec<Account>, knowledge: u64) -> SnapshotResponse {
        let mut snapshot = BudgetSnapshot::new("b1", "");
        snapshot.accounts = accounts;
        SnapshotResponse::new(snapshot, knowledge)
    }

    #[test]
    fn merges_delta_into_base() {
        let dir = TempPayloadDir::new();
        let base = dir.write_json("base.json", &SnapshotResponse::new(sample_snapshot("b1"), 10));
        let mut removed = account("acc-savings", "Savings", 0);
        removed.deleted = true;
        let delta = dir.write_json(
            "delta.json",
            &delta_response(vec![account("acc-cash", "Cash", 5), removed], 11),
        );

        let merged = merge(&base, &delta).unwrap();

        assert_eq!(merged.server_knowledge, 11);
        assert_eq!(merged.snapshot.name, "Household");
        let ids: Vec<_> = merged.snapshot.accounts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["acc-checking", "acc-cash"]);
        assert_eq!(merged.snapshot.transactions.len(), 2);
    }

    #[test]
    fn writes_output_file() {
        let dir = TempPayloadDir::new();
        let base = dir.write_json("base.json", &SnapshotResponse::new(sample_snapshot("b1"), 10));
        let delta = dir.write_json("delta.json", &delta_response(vec![], 10));
        let out = dir.path().join("merged.json");

        run(&base, &delta, Some(&out)).unwrap();

        let written: SnapshotResponse =
            serde_json::from_slice(&std::fs::read(&out).unwrap()).unwrap();
        assert_eq!(written.snapshot.record_count(), 18);
    }

    #[test]
    fn rejects_older_delta() {
        let dir = TempPayloadDir::new();
        let base = dir.write_json("base.json", &SnapshotResponse::new(sample_snapshot("b1"), 10));
        let delta = dir.write_json("delta.json", &delta_response(vec![], 9));

        let err = merge(&base, &delta).unwrap_err();
        assert!(err.to_string().contains("older"));
    }
}
