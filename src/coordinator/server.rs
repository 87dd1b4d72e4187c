//! Coordinator server implementation
//!
//! This module wires the worker pool, the dispatcher and the balancer
//! together and owns their lifecycle.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use super::balancer::{Balancer, BalancerError};
use super::config::{ConfigError, CoordinatorConfig};
use super::dispatcher::Dispatcher;
use super::pool::{PoolError, SpawnedPool, WorkerPool};

/// Time workers get to drain before they are stopped
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Coordinator Server
// ============================================================================

/// Main Coordinator server
pub struct CoordinatorServer<P> {
    config: CoordinatorConfig,
    pool: P,
}

impl<P: WorkerPool> CoordinatorServer<P> {
    /// Create a new coordinator server
    pub fn new(config: CoordinatorConfig, pool: P) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self { config, pool })
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            worker_ports: self.config.worker_ports(),
            command_timeout_secs: self.config.command_timeout_secs,
            proxy_timeout_secs: self.config.proxy_timeout_secs,
            request_logging_enabled: self.config.enable_request_logging,
        }
    }

    /// Spawn the workers, start the dispatcher and bind the public port
    pub async fn launch(mut self) -> Result<RunningCoordinator<P>, ServerError> {
        let SpawnedPool { handles, inbox } = self
            .pool
            .spawn(self.config.worker_count, self.config.base_port())
            .await?;

        let workers: Vec<WorkerInfo> = handles
            .iter()
            .map(|h| WorkerInfo {
                pid: h.pid(),
                port: h.port(),
            })
            .collect();
        let targets = workers
            .iter()
            .map(|w| SocketAddr::new(self.config.worker_host, w.port))
            .collect();

        let balancer = Arc::new(Balancer::new(targets, self.config.proxy_timeout())?);
        let dispatcher = tokio::spawn(Dispatcher::new(handles).run(inbox));

        let addr = self.config.bind_address;
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                dispatcher.abort();
                self.pool.shutdown(SHUTDOWN_GRACE).await;
                return Err(ServerError::Bind { addr, source });
            }
        };

        Ok(RunningCoordinator {
            config: self.config,
            pool: self.pool,
            listener,
            balancer,
            dispatcher,
            workers,
        })
    }

    /// Start the server and run until SIGINT/SIGTERM
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(crate::utils::shutdown_signal())
            .await
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        self.launch().await?.serve(shutdown_signal).await
    }
}

/// A coordinator whose workers are up and whose public port is bound
pub struct RunningCoordinator<P> {
    config: CoordinatorConfig,
    pool: P,
    listener: TcpListener,
    balancer: Arc<Balancer>,
    dispatcher: JoinHandle<()>,
    workers: Vec<WorkerInfo>,
}

impl<P: WorkerPool> RunningCoordinator<P> {
    /// Address the balancer is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.listener
            .local_addr()
            .unwrap_or(self.config.bind_address)
    }

    pub fn workers(&self) -> &[WorkerInfo] {
        &self.workers
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = self.balancer.clone().router();

        if self.config.enable_request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    /// Balance traffic until `shutdown_signal` resolves, then stop the workers
    pub async fn serve(
        mut self,
        shutdown_signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = self.local_addr();
        tracing::info!(%addr, workers = self.workers.len(), "coordinator listening");

        let served = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await;

        // Dropping the dispatcher closes every worker channel, which tells
        // the workers to stop.
        self.dispatcher.abort();
        let _ = self.dispatcher.await;
        self.pool.shutdown(SHUTDOWN_GRACE).await;

        served.map_err(ServerError::Serve)?;
        tracing::info!("Coordinator server shutdown complete");
        Ok(())
    }
}

/// Identity of a spawned worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerInfo {
    pub pid: Option<u32>,
    pub port: u16,
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub worker_ports: Vec<u16>,
    pub command_timeout_secs: u64,
    pub proxy_timeout_secs: Option<u64>,
    pub request_logging_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        let ports: Vec<String> = self.worker_ports.iter().map(u16::to_string).collect();
        format!(
            "Coordinator Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Workers: {} ({})\n\
             Command Timeout: {}s\n\
             Proxy Timeout: {}\n\
             Request Logging: {}",
            "",
            self.bind_address,
            self.worker_ports.len(),
            ports.join(", "),
            self.command_timeout_secs,
            self.proxy_timeout_secs
                .map(|s| format!("{s}s"))
                .unwrap_or_else(|| "none".to_string()),
            if self.request_logging_enabled { "enabled" } else { "disabled" }
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn workers: {0}")]
    Pool(#[from] PoolError),

    #[error("Failed to start balancer: {0}")]
    Balancer(#[from] BalancerError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
