//! Worker-side table of in-flight commands
//!
//! Each dispatched command registers a one-shot completion handle under a
//! fresh request id. The handle is consumed by the first matching reply;
//! later replies for the same id (or for an id that timed out) are unknown
//! and get discarded.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use uuid::Uuid;

use super::command::StoreResponse;
use super::message::{IpcResponse, RequestId};

/// In-flight commands keyed by request id
#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: Mutex<HashMap<RequestId, oneshot::Sender<StoreResponse>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a request id and its completion handle
    pub fn register(&self) -> (RequestId, oneshot::Receiver<StoreResponse>) {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.lock();

        let mut request_id = Uuid::new_v4().to_string();
        while entries.contains_key(&request_id) {
            request_id = Uuid::new_v4().to_string();
        }

        entries.insert(request_id.clone(), tx);
        (request_id, rx)
    }

    /// Resolve the pending entry matching `reply`
    ///
    /// Returns `false` when no entry exists for the id.
    pub fn complete(&self, reply: IpcResponse) -> bool {
        let Some(tx) = self.lock().remove(&reply.request_id) else {
            return false;
        };

        // The waiter may have given up already; that is not an error here.
        let _ = tx.send(reply.response);
        true
    }

    /// Drop the entry for `request_id` without resolving it
    pub fn cancel(&self, request_id: &str) -> bool {
        self.lock().remove(request_id).is_some()
    }

    /// Drop every entry; waiters observe a closed channel
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<StoreResponse>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
