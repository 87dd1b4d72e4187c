//! herd - clustered CRUD user store
//!
//! A coordinator process balances HTTP traffic across a pool of stateless
//! workers. Workers turn requests into store commands and send them back to
//! the coordinator, which owns the only copy of the data.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`coordinator`] - Worker pool, round-robin balancer and command dispatcher
//! - [`worker`] - HTTP routes and command executors
//! - [`protocol`] - Commands, responses and the IPC message schema
//! - [`store`] - The in-memory user table
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use herd::config::Config;
//! use herd::coordinator::{CoordinatorServer, TaskPool};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let pool = TaskPool::new(config.worker_config());
//!     let server = CoordinatorServer::new(config.coordinator_config()?, pool)?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod protocol;
pub mod store;
pub mod utils;
pub mod worker;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::coordinator::{CoordinatorConfig, CoordinatorServer, ProcessPool, TaskPool};
    pub use crate::error::{Error, Result};
    pub use crate::protocol::{Command, Outcome, StoreResponse};
    pub use crate::store::{User, UserData, UserStore};
    pub use crate::worker::{WorkerConfig, WorkerServer};
}

// Direct re-exports for convenience
pub use protocol::{Command, StoreResponse};
pub use store::{User, UserData, UserStore};
