//! Clustered worker bootstrap
//!
//! A clustered worker holds no data. It waits for its port assignment,
//! starts the HTTP listener with an [`IpcExecutor`], and routes every reply
//! from the coordinator to the matching pending command. When the channel
//! closes the worker fails whatever is still in flight and shuts down.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::protocol::{decode_line, encode_line, CoordinatorMessage, IpcRequest, PendingRequests};
use crate::utils::shutdown_signal;

use super::executor::IpcExecutor;
use super::server::{WorkerConfig, WorkerError, WorkerServer};

/// Both directions of a worker's link to the coordinator
pub struct WorkerChannel {
    pub outbound: mpsc::UnboundedSender<IpcRequest>,
    pub inbound: mpsc::UnboundedReceiver<CoordinatorMessage>,
}

impl WorkerChannel {
    pub fn new(
        outbound: mpsc::UnboundedSender<IpcRequest>,
        inbound: mpsc::UnboundedReceiver<CoordinatorMessage>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Channel carried as newline-delimited JSON over stdin/stdout
    ///
    /// Used by worker child processes; stdout is reserved for the protocol.
    pub fn stdio() -> Self {
        let (outbound, mut outgoing) = mpsc::unbounded_channel::<IpcRequest>();
        let (incoming, inbound) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(request) = outgoing.recv().await {
                let line = match encode_line(&request) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "failed to encode request");
                        continue;
                    }
                };
                if let Err(e) = write_line(&mut stdout, &line).await {
                    error!(error = %e, "failed to write to coordinator");
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match decode_line::<CoordinatorMessage>(&line) {
                        Ok(message) => {
                            if incoming.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "ignoring malformed coordinator message"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "failed to read from coordinator");
                        break;
                    }
                }
            }
        });

        Self::new(outbound, inbound)
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, line: &str) -> std::io::Result<()> {
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await
}

/// Run a clustered worker until its channel closes or the process is told to stop
pub async fn run_worker(channel: WorkerChannel, config: WorkerConfig) -> Result<(), WorkerError> {
    let WorkerChannel {
        outbound,
        mut inbound,
    } = channel;

    let port = loop {
        match inbound.recv().await {
            Some(CoordinatorMessage::Assign(assignment)) => break assignment.port,
            Some(CoordinatorMessage::Reply(reply)) => {
                warn!(request_id = %reply.request_id, "reply received before port assignment");
            }
            None => return Err(WorkerError::Unassigned),
        }
    };
    info!(port, pid = std::process::id(), "worker received port assignment");

    let executor = IpcExecutor::new(outbound, config.command_timeout);
    let pending = executor.pending();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(route_replies(inbound, pending, closed_tx));

    let server = WorkerServer::new(config.address(port), Arc::new(executor))
        .with_request_logging(config.enable_request_logging);

    server
        .start_with_shutdown(async move {
            tokio::select! {
                _ = closed_rx => info!(port, "coordinator channel closed, shutting down"),
                _ = shutdown_signal() => {}
            }
        })
        .await
}

/// Deliver replies to their waiters until the channel closes
async fn route_replies(
    mut inbound: mpsc::UnboundedReceiver<CoordinatorMessage>,
    pending: Arc<PendingRequests>,
    closed: oneshot::Sender<()>,
) {
    while let Some(message) = inbound.recv().await {
        match message {
            CoordinatorMessage::Reply(reply) => {
                let request_id = reply.request_id.clone();
                if !pending.complete(reply) {
                    debug!(request_id = %request_id, "discarding reply with no pending request");
                }
            }
            CoordinatorMessage::Assign(assignment) => {
                warn!(port = assignment.port, "ignoring repeated port assignment");
            }
        }
    }

    let abandoned = pending.clear();
    if abandoned > 0 {
        warn!(abandoned, "coordinator channel closed with commands in flight");
    }
    let _ = closed.send(());
}
