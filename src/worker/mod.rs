//! Stateless HTTP workers
//!
//! A worker parses client requests into store [`Command`](crate::protocol::Command)s
//! and renders the store's answer as an HTTP response. Where the command is
//! executed depends on the [`CommandExecutor`]:
//!
//! - [`LocalExecutor`] - private store, used by the non-clustered `serve` mode
//! - [`IpcExecutor`] - forwards to the coordinator, used by clustered workers
//!
//! # Usage
//!
//! ```ignore
//! use herd::worker::{run_worker, WorkerChannel, WorkerConfig};
//!
//! run_worker(WorkerChannel::stdio(), WorkerConfig::default()).await?;
//! ```

pub mod api;
pub mod executor;
pub mod runtime;
pub mod server;

pub use api::{create_router, ApiError};
pub use executor::{CommandExecutor, ExecuteError, IpcExecutor, LocalExecutor};
pub use runtime::{run_worker, WorkerChannel};
pub use server::{WorkerConfig, WorkerError, WorkerServer, DEFAULT_COMMAND_TIMEOUT};
