//! Serial command execution on the coordinator side
//!
//! The dispatcher is the store's only owner. It drains the pool inbox one
//! envelope at a time, so commands run in arrival order and never
//! interleave, and each reply goes back to the worker that asked.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::protocol::{Command, IpcResponse, StoreFault, StoreResponse};
use crate::store::UserStore;

use super::pool::{Envelope, WorkerHandle};

/// Anything that executes store commands synchronously
pub trait CommandHandler: Send {
    fn handle(&mut self, command: Command) -> StoreResponse;
}

impl CommandHandler for UserStore {
    fn handle(&mut self, command: Command) -> StoreResponse {
        self.execute(command)
    }
}

/// Owner of the authoritative store
pub struct Dispatcher<S = UserStore> {
    store: S,
    workers: Vec<WorkerHandle>,
}

impl Dispatcher<UserStore> {
    pub fn new(workers: Vec<WorkerHandle>) -> Self {
        Self::with_store(UserStore::new(), workers)
    }
}

impl<S: CommandHandler> Dispatcher<S> {
    pub fn with_store(store: S, workers: Vec<WorkerHandle>) -> Self {
        Self { store, workers }
    }

    /// Execute one request and reply to its sender only
    pub fn dispatch(&mut self, envelope: Envelope) {
        let Envelope { worker, request } = envelope;
        let Some(handle) = self.workers.get(worker) else {
            warn!(worker, request_id = %request.request_id, "request from unknown worker dropped");
            return;
        };

        let command_name = request.command.name();
        let store = &mut self.store;
        let response = catch_unwind(AssertUnwindSafe(|| store.handle(request.command)))
            .unwrap_or_else(|_| {
                error!(worker, command = command_name, "store execution panicked");
                StoreResponse::failure(StoreFault::InternalServerError)
            });

        debug!(
            worker,
            request_id = %request.request_id,
            command = command_name,
            success = response.is_success(),
            "command executed"
        );

        let reply = IpcResponse {
            request_id: request.request_id,
            response,
        };
        if let Err(e) = handle.send(reply) {
            warn!(worker, error = %e, "could not deliver reply");
        }
    }

    /// Drain the inbox until every worker channel is gone
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        info!(workers = self.workers.len(), "dispatcher started");
        while let Some(envelope) = inbox.recv().await {
            self.dispatch(envelope);
        }
        info!("dispatcher stopped");
    }
}
