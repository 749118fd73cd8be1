//! CLI command implementations.

pub mod diff;
pub mod inspect;
pub mod merge;

use budgetsync_protocol::{BudgetSnapshot, SnapshotResponse};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Result type shared by command functions.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// The API's response envelope: `{"data": {"budget": ..., "server_knowledge": n}}`.
#[derive(Deserialize)]
struct Envelope {
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    budget: BudgetSnapshot,
    #[serde(default)]
    server_knowledge: u64,
}

/// Loads a payload file.
///
/// Accepts a saved [`SnapshotResponse`], a raw API response envelope, or a
/// bare snapshot (read as knowledge 0).
pub fn load_response(path: &Path) -> CommandResult<SnapshotResponse> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| format!("{} is not valid JSON: {e}", path.display()))?;

    let response = if value.get("data").is_some() {
        let envelope: Envelope = serde_json::from_value(value)?;
        SnapshotResponse::new(envelope.data.budget, envelope.data.server_knowledge)
    } else if value.get("snapshot").is_some() {
        serde_json::from_value(value)?
    } else {
        SnapshotResponse::new(serde_json::from_value(value)?, 0)
    };

    tracing::debug!(
        path = %path.display(),
        records = response.snapshot.record_count(),
        server_knowledge = response.server_knowledge,
        "payload loaded"
    );
    Ok(response)
}

/// Replica ID used for offline files: the snapshot's own ID, else the file stem.
pub fn replica_id(response: &SnapshotResponse, path: &Path) -> String {
    if !response.snapshot.id.is_empty() {
        return response.snapshot.id.clone();
    }
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "budget".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetsync_testkit::{sample_snapshot, TempPayloadDir};
    use serde_json::json;

    #[test]
    fn loads_saved_response() {
        let dir = TempPayloadDir::new();
        let path = dir.write_json(
            "saved.json",
            &SnapshotResponse::new(sample_snapshot("b1"), 42),
        );

        let response = load_response(&path).unwrap();
        assert_eq!(response.server_knowledge, 42);
        assert_eq!(response.snapshot.accounts.len(), 2);
    }

    #[test]
    fn loads_api_envelope() {
        let dir = TempPayloadDir::new();
        let path = dir.write_json(
            "envelope.json",
            &json!({
                "data": {
                    "budget": {"id": "b1", "name": "Household", "accounts": [{"id": "a1", "name": "Checking"}]},
                    "server_knowledge": 7
                }
            }),
        );

        let response = load_response(&path).unwrap();
        assert_eq!(response.server_knowledge, 7);
        assert_eq!(response.snapshot.accounts[0].id, "a1");
    }

    #[test]
    fn loads_bare_snapshot() {
        let dir = TempPayloadDir::new();
        let mut snapshot = sample_snapshot("");
        snapshot.name = "No ID".into();
        let path = dir.write_json("household.json", &snapshot);

        let response = load_response(&path).unwrap();
        assert_eq!(response.server_knowledge, 0);
        assert_eq!(replica_id(&response, &path), "household");
    }

    #[test]
    fn rejects_invalid_json() {
        let dir = TempPayloadDir::new();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_response(&path).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        assert!(load_response(&dir.path().join("missing.json")).is_err());
    }
}
