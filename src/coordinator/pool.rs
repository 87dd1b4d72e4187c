//! Worker pools
//!
//! A pool spawns `n` workers, assigns each one a port, and exposes:
//!
//! - one [`WorkerHandle`] per worker for sending messages down its channel
//! - a single inbox that merges every worker's requests, tagged with the
//!   index of the worker that sent them
//!
//! Two implementations exist. [`ProcessPool`] runs each worker as a child
//! OS process speaking newline-delimited JSON over stdin/stdout.
//! [`TaskPool`] runs each worker as a tokio task in the current process.
//! The coordinator logic is the same for both.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as ProcessCommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{decode_line, encode_line, CoordinatorMessage, IpcRequest, PortAssignment};
use crate::worker::{run_worker, WorkerChannel, WorkerConfig};

// ============================================================================
// Handles
// ============================================================================

/// The coordinator's end of one worker
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    index: usize,
    pid: Option<u32>,
    port: u16,
    channel: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl WorkerHandle {
    pub fn new(
        index: usize,
        pid: Option<u32>,
        port: u16,
        channel: mpsc::UnboundedSender<CoordinatorMessage>,
    ) -> Self {
        Self {
            index,
            pid,
            port,
            channel,
        }
    }

    /// Position of the worker in the pool
    pub fn index(&self) -> usize {
        self.index
    }

    /// OS process id, when the worker is a process
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send a message to this worker only
    pub fn send(&self, message: impl Into<CoordinatorMessage>) -> Result<(), PoolError> {
        self.channel
            .send(message.into())
            .map_err(|_| PoolError::Disconnected { worker: self.index })
    }
}

/// A request tagged with the worker that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub worker: usize,
    pub request: IpcRequest,
}

/// Result of spawning a pool
pub struct SpawnedPool {
    pub handles: Vec<WorkerHandle>,
    pub inbox: mpsc::UnboundedReceiver<Envelope>,
}

/// Capability to start and stop a set of workers
#[async_trait]
pub trait WorkerPool: Send {
    /// Spawn `count` workers on ports `base_port..base_port + count`
    ///
    /// Each worker receives its port assignment exactly once, before this
    /// returns.
    async fn spawn(&mut self, count: usize, base_port: u16) -> Result<SpawnedPool, PoolError>;

    /// Wait up to `grace` for workers to exit, then stop the rest
    async fn shutdown(&mut self, grace: Duration);
}

fn worker_port(base_port: u16, index: usize) -> Result<u16, PoolError> {
    u16::try_from(index)
        .ok()
        .and_then(|offset| base_port.checked_add(offset))
        .ok_or(PoolError::PortOverflow { base_port, index })
}

// ============================================================================
// In-process Pool
// ============================================================================

/// Workers as tokio tasks sharing the coordinator's process
pub struct TaskPool {
    config: WorkerConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl TaskPool {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
        }
    }
}

#[async_trait]
impl WorkerPool for TaskPool {
    async fn spawn(&mut self, count: usize, base_port: u16) -> Result<SpawnedPool, PoolError> {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(count);

        for index in 0..count {
            let port = worker_port(base_port, index)?;
            let (to_worker, from_coordinator) = mpsc::unbounded_channel();
            let (to_coordinator, mut from_worker) = mpsc::unbounded_channel::<IpcRequest>();

            let inbox_tx = inbox_tx.clone();
            self.tasks.push(tokio::spawn(async move {
                while let Some(request) = from_worker.recv().await {
                    if inbox_tx.send(Envelope { worker: index, request }).is_err() {
                        break;
                    }
                }
            }));

            let config = self.config.clone();
            let channel = WorkerChannel::new(to_coordinator, from_coordinator);
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = run_worker(channel, config).await {
                    error!(worker = index, error = %e, "worker task failed");
                }
            }));

            let handle = WorkerHandle::new(index, Some(std::process::id()), port, to_worker);
            handle.send(PortAssignment { port })?;
            debug!(worker = index, port, "spawned worker task");
            handles.push(handle);
        }

        Ok(SpawnedPool { handles, inbox })
    }

    async fn shutdown(&mut self, grace: Duration) {
        let tasks = std::mem::take(&mut self.tasks);
        let aborts: Vec<_> = tasks.iter().map(|t| t.abort_handle()).collect();

        if tokio::time::timeout(grace, futures::future::join_all(tasks))
            .await
            .is_err()
        {
            warn!("worker tasks did not stop in time, aborting");
            aborts.iter().for_each(|a| a.abort());
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

// ============================================================================
// Process Pool
// ============================================================================

/// Workers as child processes of the coordinator
pub struct ProcessPool {
    program: PathBuf,
    args: Vec<String>,
    children: Vec<Child>,
}

impl ProcessPool {
    /// Spawn `program args…` for every worker
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            children: Vec::new(),
        }
    }

    /// Re-run the current executable with `args` for every worker
    pub fn current_exe(args: Vec<String>) -> Result<Self, PoolError> {
        let program = std::env::current_exe().map_err(PoolError::CurrentExe)?;
        Ok(Self::new(program, args))
    }
}

#[async_trait]
impl WorkerPool for ProcessPool {
    async fn spawn(&mut self, count: usize, base_port: u16) -> Result<SpawnedPool, PoolError> {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(count);

        for index in 0..count {
            let port = worker_port(base_port, index)?;
            let mut child = ProcessCommand::new(&self.program)
                .args(&self.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| PoolError::Spawn { index, source })?;

            let stdin = child.stdin.take().ok_or(PoolError::MissingPipe { index })?;
            let stdout = child.stdout.take().ok_or(PoolError::MissingPipe { index })?;
            let pid = child.id();

            let (to_worker, outgoing) = mpsc::unbounded_channel();
            tokio::spawn(write_messages(index, stdin, outgoing));
            tokio::spawn(read_requests(index, stdout, inbox_tx.clone()));

            let handle = WorkerHandle::new(index, pid, port, to_worker);
            handle.send(PortAssignment { port })?;
            info!(worker = index, pid = ?pid, port, "spawned worker process");

            self.children.push(child);
            handles.push(handle);
        }

        Ok(SpawnedPool { handles, inbox })
    }

    async fn shutdown(&mut self, grace: Duration) {
        for mut child in self.children.drain(..) {
            let pid = child.id();
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(pid = ?pid, %status, "worker process exited"),
                Ok(Err(e)) => warn!(pid = ?pid, error = %e, "failed to wait for worker process"),
                Err(_) => {
                    warn!(pid = ?pid, "worker process did not exit in time, killing");
                    if let Err(e) = child.kill().await {
                        warn!(pid = ?pid, error = %e, "failed to kill worker process");
                    }
                }
            }
        }
    }
}

/// Pump coordinator messages into a child's stdin
async fn write_messages(
    index: usize,
    mut stdin: ChildStdin,
    mut outgoing: mpsc::UnboundedReceiver<CoordinatorMessage>,
) {
    while let Some(message) = outgoing.recv().await {
        let line = match encode_line(&message) {
            Ok(line) => line,
            Err(e) => {
                error!(worker = index, error = %e, "failed to encode message");
                continue;
            }
        };

        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(e) = written.await {
            warn!(worker = index, error = %e, "worker channel closed");
            break;
        }
    }
}

/// Pump a child's stdout into the shared inbox
async fn read_requests(
    index: usize,
    stdout: ChildStdout,
    inbox: mpsc::UnboundedSender<Envelope>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_line::<IpcRequest>(&line) {
                Ok(request) => {
                    if inbox.send(Envelope { worker: index, request }).is_err() {
                        break;
                    }
                }
                Err(e) => debug!(worker = index, error = %e, "ignoring non-request message"),
            },
            Ok(None) => {
                warn!(worker = index, "worker process closed its channel");
                break;
            }
            Err(e) => {
                warn!(worker = index, error = %e, "failed to read from worker");
                break;
            }
        }
    }
}

// ============================================================================
// Pool Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to spawn worker {index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {index} was spawned without piped stdio")]
    MissingPipe { index: usize },

    #[error("Failed to locate the current executable: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("Worker {worker} is disconnected")]
    Disconnected { worker: usize },

    #[error("Worker {index} port overflows base port {base_port}")]
    PortOverflow { base_port: u16, index: usize },
}
