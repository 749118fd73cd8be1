//! Transport abstraction for fetching budget payloads.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use budgetsync_protocol::SnapshotResponse;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// A sync provider fetches budget payloads from the remote API.
///
/// This trait abstracts the network layer. Implementations own
/// authentication, retries, rate limiting and timeouts; the engine treats
/// any error as terminal for the current sync attempt.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Fetches a full export of the budget.
    async fn full_sync(&self, replica_id: &str) -> SyncResult<SnapshotResponse>;

    /// Fetches every change since `since_knowledge`, tombstones included.
    async fn delta_sync(&self, replica_id: &str, since_knowledge: u64)
        -> SyncResult<SnapshotResponse>;
}

/// A provider call recorded by [`MockProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `full_sync(replica_id)`.
    Full {
        /// Budget ID.
        replica_id: String,
    },
    /// `delta_sync(replica_id, since_knowledge)`.
    Delta {
        /// Budget ID.
        replica_id: String,
        /// Knowledge passed in.
        since_knowledge: u64,
    },
}

/// A scripted provider for testing.
///
/// Responses are queued per call kind and consumed in order. A call with
/// an empty queue fails with a protocol error.
#[derive(Debug)]
pub struct MockProvider {
    connected: AtomicBool,
    full_responses: Mutex<VecDeque<SyncResult<SnapshotResponse>>>,
    delta_responses: Mutex<VecDeque<SyncResult<SnapshotResponse>>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl MockProvider {
    /// Creates a new mock provider.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            full_responses: Mutex::new(VecDeque::new()),
            delta_responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues a full sync response.
    pub fn push_full(&self, response: SnapshotResponse) {
        self.full_responses.lock().push_back(Ok(response));
    }

    /// Queues a full sync failure.
    pub fn push_full_error(&self, error: SyncError) {
        self.full_responses.lock().push_back(Err(error));
    }

    /// Queues a delta sync response.
    pub fn push_delta(&self, response: SnapshotResponse) {
        self.delta_responses.lock().push_back(Ok(response));
    }

    /// Queues a delta sync failure.
    pub fn push_delta_error(&self, error: SyncError) {
        self.delta_responses.lock().push_back(Err(error));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of full sync calls.
    pub fn full_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Full { .. }))
            .count()
    }

    /// Returns the number of delta sync calls.
    pub fn delta_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Delta { .. }))
            .count()
    }

    /// Returns the number of responses still queued.
    pub fn pending_responses(&self) -> usize {
        self.full_responses.lock().len() + self.delta_responses.lock().len()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncProvider for MockProvider {
    async fn full_sync(&self, replica_id: &str) -> SyncResult<SnapshotResponse> {
        self.calls.lock().push(ProviderCall::Full {
            replica_id: replica_id.to_string(),
        });
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        self.full_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Protocol("no mock full response queued".into())))
    }

    async fn delta_sync(
        &self,
        replica_id: &str,
        since_knowledge: u64,
    ) -> SyncResult<SnapshotResponse> {
        self.calls.lock().push(ProviderCall::Delta {
            replica_id: replica_id.to_string(),
            since_knowledge,
        });
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::NotConnected);
        }
        self.delta_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::Protocol("no mock delta response queued".into())))
    }
}
