//! Command execution from the worker's point of view
//!
//! A worker either owns a private store (standalone mode) or forwards every
//! command to the coordinator and waits for the correlated reply (clustered
//! mode). Route handlers only see [`CommandExecutor`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::protocol::{Command, IpcRequest, PendingRequests, RequestId, StoreResponse};
use crate::store::UserStore;

/// Errors raised while obtaining a store response
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// No reply arrived before the command timeout
    #[error("Command {request_id} timed out after {after:?}")]
    Timeout { request_id: RequestId, after: Duration },

    /// The coordinator channel is gone
    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Something that can run store commands
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: Command) -> Result<StoreResponse, ExecuteError>;
}

// ============================================================================
// Standalone
// ============================================================================

/// Executes commands against a store owned by this process
#[derive(Debug, Default)]
pub struct LocalExecutor {
    store: Mutex<UserStore>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(&self, command: Command) -> Result<StoreResponse, ExecuteError> {
        Ok(self.store.lock().await.execute(command))
    }
}

// ============================================================================
// Clustered
// ============================================================================

/// Forwards commands to the coordinator over the worker channel
pub struct IpcExecutor {
    pending: Arc<PendingRequests>,
    outbound: mpsc::UnboundedSender<IpcRequest>,
    timeout: Duration,
}

impl IpcExecutor {
    pub fn new(outbound: mpsc::UnboundedSender<IpcRequest>, timeout: Duration) -> Self {
        Self {
            pending: Arc::new(PendingRequests::new()),
            outbound,
            timeout,
        }
    }

    /// Table shared with the task that routes replies back in
    pub fn pending(&self) -> Arc<PendingRequests> {
        self.pending.clone()
    }
}

#[async_trait]
impl CommandExecutor for IpcExecutor {
    async fn execute(&self, command: Command) -> Result<StoreResponse, ExecuteError> {
        let (request_id, reply) = self.pending.register();
        debug!(request_id = %request_id, command = command.name(), "dispatching command");

        let request = IpcRequest {
            request_id: request_id.clone(),
            command,
        };
        if self.outbound.send(request).is_err() {
            self.pending.cancel(&request_id);
            return Err(ExecuteError::ChannelClosed);
        }

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ExecuteError::ChannelClosed),
            Err(_) => {
                self.pending.cancel(&request_id);
                warn!(request_id = %request_id, "command timed out waiting for coordinator");
                Err(ExecuteError::Timeout {
                    request_id,
                    after: self.timeout,
                })
            }
        }
    }
}
