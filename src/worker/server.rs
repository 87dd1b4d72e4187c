//! Worker HTTP server

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::api::{create_router, ExecutorState};
use super::executor::LocalExecutor;

/// Default time a clustered worker waits for the coordinator's reply
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Worker Configuration
// ============================================================================

/// Settings shared by every worker in a cluster
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interface the worker listens on; the port comes from the coordinator
    pub host: IpAddr,

    /// How long a forwarded command may wait for its reply
    pub command_timeout: Duration,

    /// Log every request through `TraceLayer`
    pub enable_request_logging: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            enable_request_logging: true,
        }
    }
}

impl WorkerConfig {
    /// Listen address for an assigned port
    pub fn address(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.host, port)
    }
}

// ============================================================================
// Worker Server
// ============================================================================

/// HTTP listener serving the user routes
pub struct WorkerServer {
    addr: SocketAddr,
    executor: ExecutorState,
    enable_request_logging: bool,
}

impl WorkerServer {
    pub fn new(addr: SocketAddr, executor: ExecutorState) -> Self {
        Self {
            addr,
            executor,
            enable_request_logging: true,
        }
    }

    /// Server with its own private store (non-clustered mode)
    pub fn standalone(addr: SocketAddr) -> Self {
        Self::new(addr, Arc::new(LocalExecutor::new()))
    }

    pub fn with_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = enable;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let router = create_router(self.executor.clone());

        if self.enable_request_logging {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        }
    }

    pub async fn bind(&self) -> Result<TcpListener, WorkerError> {
        TcpListener::bind(self.addr)
            .await
            .map_err(|source| WorkerError::Bind {
                addr: self.addr,
                source,
            })
    }

    /// Bind and serve until `shutdown` resolves, then drain open connections
    pub async fn start_with_shutdown(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WorkerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WorkerError> {
        let local = listener.local_addr().unwrap_or(self.addr);
        tracing::info!(addr = %local, pid = std::process::id(), "worker listening");

        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(WorkerError::Serve)?;

        tracing::info!(addr = %local, "worker shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Worker Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Coordinator channel closed before a port was assigned")]
    Unassigned,
}
