//! Configuration management for herd
//!
//! This module handles loading and validating configuration from environment variables,
//! files, and command-line arguments.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::coordinator::{default_worker_count, CoordinatorConfig};
use crate::error::{Error, Result};
use crate::worker::WorkerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,

    /// Worker cluster configuration
    pub cluster: ClusterConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface the public listeners bind to
    pub host: IpAddr,

    /// Balancer port in cluster mode
    pub balancer_port: u16,

    /// Listener port in standalone mode
    pub standalone_port: u16,
}

/// Worker cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Number of workers
    pub workers: usize,

    /// Seconds a worker waits for the store's reply
    pub command_timeout_secs: u64,

    /// Seconds the balancer waits for a worker; unset disables the limit
    pub proxy_timeout_secs: Option<u64>,

    /// Log every request at the balancer and the workers
    pub request_logging: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            balancer_port: 3000,
            standalone_port: 4000,
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            command_timeout_secs: 10,
            proxy_timeout_secs: None,
            request_logging: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparseable variables fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let balancer_port = env_parse("MULTI_PORT").unwrap_or(defaults.server.balancer_port);
        let standalone_port = env_parse("USERS_PORT").unwrap_or(defaults.server.standalone_port);
        let host = env_parse("HERD_HOST").unwrap_or(defaults.server.host);

        let workers = env_parse("HERD_WORKERS").unwrap_or(defaults.cluster.workers);
        let command_timeout_secs =
            env_parse("HERD_COMMAND_TIMEOUT").unwrap_or(defaults.cluster.command_timeout_secs);
        let proxy_timeout_secs = env_parse("HERD_PROXY_TIMEOUT");

        let level = std::env::var("HERD_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let format = std::env::var("HERD_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            server: ServerConfig {
                host,
                balancer_port,
                standalone_port,
            },
            cluster: ClusterConfig {
                workers,
                command_timeout_secs,
                proxy_timeout_secs,
                request_logging: defaults.cluster.request_logging,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(format!("Failed to read config file: {}", path.display()), e)
        })?;

        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cluster.workers == 0 {
            return Err(Error::config("workers must be greater than 0"));
        }

        if self.cluster.command_timeout_secs == 0 {
            return Err(Error::config("command_timeout_secs must be greater than 0"));
        }

        if self.cluster.proxy_timeout_secs == Some(0) {
            return Err(Error::config("proxy_timeout_secs must be greater than 0 when set"));
        }

        let last_worker = u16::try_from(self.cluster.workers)
            .ok()
            .and_then(|n| self.server.balancer_port.checked_add(n));
        if last_worker.is_none() {
            return Err(Error::config(format!(
                "{} workers after port {} exceed the port range",
                self.cluster.workers, self.server.balancer_port
            )));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(Error::config(format!(
                "unknown log format '{}', expected text or json",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Public address in cluster mode
    pub fn balancer_address(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.balancer_port)
    }

    /// Listener address in standalone mode
    pub fn standalone_address(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.standalone_port)
    }

    /// Get command timeout as Duration
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster.command_timeout_secs)
    }

    /// Coordinator settings derived from this configuration
    pub fn coordinator_config(&self) -> Result<CoordinatorConfig> {
        let builder = CoordinatorConfig::builder()
            .bind_address(self.balancer_address())
            .worker_count(self.cluster.workers)
            .command_timeout_secs(self.cluster.command_timeout_secs)
            .enable_request_logging(self.cluster.request_logging);

        let builder = match self.cluster.proxy_timeout_secs {
            Some(secs) => builder.proxy_timeout_secs(secs),
            None => builder,
        };

        Ok(builder.build()?)
    }

    /// Settings for a single worker
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            command_timeout: self.command_timeout(),
            enable_request_logging: self.cluster.request_logging,
            ..WorkerConfig::default()
        }
    }
}
