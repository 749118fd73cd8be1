//! Audit trail of completed syncs.
//!
//! The engine hands each successful sync to an [`AuditSink`] on a spawned
//! task and never waits for it on the sync path. Failures are only visible
//! in logs and in [`SyncStats::audit_failures`](crate::SyncStats).

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use budgetsync_protocol::{BudgetSnapshot, SyncKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One audit trail record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// Budget ID.
    pub replica_id: String,
    /// Sync kind that produced the payload.
    pub kind: SyncKind,
    /// True when the payload replaced a drifted replica.
    pub self_heal: bool,
    /// When the entry was created.
    pub recorded_at: DateTime<Utc>,
    /// Knowledge after the sync.
    pub server_knowledge: u64,
    /// Knowledge before the sync, if a replica existed.
    pub previous_knowledge: Option<u64>,
    /// Payload as received: a full export or a delta.
    pub snapshot: BudgetSnapshot,
}

/// Receives audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one entry.
    async fn persist(&self, entry: AuditEntry) -> SyncResult<()>;
}

/// Keeps audit entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failure: Mutex<Option<String>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every entry persisted so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Returns the number of persisted entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was persisted.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Makes every subsequent `persist` fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn persist(&self, entry: AuditEntry) -> SyncResult<()> {
        let failure = self.failure.lock().clone();
        if let Some(message) = failure {
            return Err(SyncError::Audit(message));
        }
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// Writes each entry as a pretty-printed JSON file.
///
/// Layout: `<root>/<replica_id>/<timestamp>-<kind>-<knowledge>.json`.
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    root: PathBuf,
}

impl FileAuditSink {
    /// Creates a sink rooted at `root`. Directories are created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file an entry is written to.
    pub fn path_for(&self, entry: &AuditEntry) -> PathBuf {
        let suffix = if entry.self_heal { "-heal" } else { "" };
        self.root.join(sanitize(&entry.replica_id)).join(format!(
            "{}-{}-{}{}.json",
            entry.recorded_at.format("%Y%m%dT%H%M%S%.3fZ"),
            entry.kind,
            entry.server_knowledge,
            suffix
        ))
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn persist(&self, entry: AuditEntry) -> SyncResult<()> {
        let path = self.path_for(&entry);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&entry)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), "audit entry written");
        Ok(())
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(replica_id: &str, kind: SyncKind, knowledge: u64) -> AuditEntry {
        AuditEntry {
            replica_id: replica_id.into(),
            kind,
            self_heal: false,
            recorded_at: Utc::now(),
            server_knowledge: knowledge,
            previous_knowledge: None,
            snapshot: BudgetSnapshot::new(replica_id, "Budget"),
        }
    }

    #[tokio::test]
    async fn memory_sink_records_entries() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());

        sink.persist(entry("b1", SyncKind::Full, 1)).await.unwrap();
        sink.persist(entry("b1", SyncKind::Delta, 2)).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.entries()[1].kind, SyncKind::Delta);
    }

    #[tokio::test]
    async fn memory_sink_can_fail() {
        let sink = MemoryAuditSink::new();
        sink.fail_with("disk full");

        let err = sink.persist(entry("b1", SyncKind::Full, 1)).await.unwrap_err();
        assert!(matches!(err, SyncError::Audit(ref m) if m == "disk full"));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn file_sink_writes_json() {
        let dir = TempDir::new().unwrap();
        let sink = FileAuditSink::new(dir.path());
        let entry = entry("budget/1", SyncKind::Delta, 1001);
        let path = sink.path_for(&entry);

        sink.persist(entry).await.unwrap();

        assert!(path.starts_with(dir.path().join("budget_1")));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-delta-1001.json"), "{name}");

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["kind"], "delta");
        assert_eq!(written["server_knowledge"], 1001);
        assert_eq!(written["snapshot"]["id"], "budget/1");
    }

    #[test]
    fn heal_entries_are_marked_in_file_name() {
        let sink = FileAuditSink::new("/tmp/audit");
        let mut heal = entry("b1", SyncKind::Full, 7);
        heal.self_heal = true;

        let name = sink.path_for(&heal).file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-full-7-heal.json"), "{name}");
    }
}
