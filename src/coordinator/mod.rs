//! Coordinator for a single-host worker cluster
//!
//! The coordinator spawns the worker pool, balances public traffic across
//! it, and executes every store command the workers send back.
//!
//! # Architecture
//!
//! ```text
//!            clients
//!               │
//! ┌─────────────▼───────────────────────┐
//! │         Coordinator Server          │
//! │                                     │
//! │  ┌──────────────────────────────┐   │
//! │  │          Balancer            │   │
//! │  │  - Round-robin cursor        │   │
//! │  │  - Streaming reverse proxy   │   │
//! │  └──────────────┬───────────────┘   │
//! │                 │ HTTP              │
//! │  ┌──────────────▼───────────────┐   │
//! │  │        Worker Pool           │   │
//! │  │  - Port assignment           │   │
//! │  │  - Per-worker channels       │   │
//! │  └──────────────┬───────────────┘   │
//! │                 │ {requestId, ...}  │
//! │  ┌──────────────▼───────────────┐   │
//! │  │         Dispatcher           │   │
//! │  │  - Owns the UserStore        │   │
//! │  │  - One command at a time     │   │
//! │  └──────────────────────────────┘   │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use herd::coordinator::{CoordinatorConfig, CoordinatorServer, ProcessPool};
//!
//! let config = CoordinatorConfig::default();
//! let pool = ProcessPool::current_exe(vec!["worker".to_string()])?;
//! CoordinatorServer::new(config, pool)?.start().await?;
//! ```

pub mod balancer;
pub mod config;
pub mod dispatcher;
pub mod pool;
pub mod server;

// Re-export main types
pub use balancer::{Balancer, BalancerError};
pub use config::{default_worker_count, ConfigError, CoordinatorConfig};
pub use dispatcher::{CommandHandler, Dispatcher};
pub use pool::{Envelope, PoolError, ProcessPool, SpawnedPool, TaskPool, WorkerHandle, WorkerPool};
pub use server::{CoordinatorServer, RunningCoordinator, ServerError, ServerInfo, WorkerInfo};
