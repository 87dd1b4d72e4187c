//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::worker::WorkerConfig;

const DEFAULT_PORT: u16 = 3000;

/// Configuration for the Coordinator server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Public (balancer) bind address
    pub bind_address: SocketAddr,

    /// Number of workers to spawn
    pub worker_count: usize,

    /// Port of the first worker; defaults to the public port + 1
    pub worker_base_port: Option<u16>,

    /// Interface workers listen on and the balancer connects to
    pub worker_host: IpAddr,

    /// How long a worker waits for the reply to a forwarded command
    pub command_timeout_secs: u64,

    /// Upper bound on a proxied exchange; unset means wait indefinitely
    pub proxy_timeout_secs: Option<u64>,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            worker_count: default_worker_count(),
            worker_base_port: None,
            worker_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            command_timeout_secs: 10,
            proxy_timeout_secs: None,
            enable_request_logging: true,
        }
    }
}

/// One worker per available core, minus the one the coordinator runs on
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

impl CoordinatorConfig {
    /// Create a new config builder
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Port assigned to the first worker
    pub fn base_port(&self) -> u16 {
        self.worker_base_port
            .unwrap_or_else(|| self.bind_address.port().saturating_add(1))
    }

    /// Ports assigned to every worker, in pool order
    pub fn worker_ports(&self) -> Vec<u16> {
        let base = self.base_port();
        (0..self.worker_count)
            .filter_map(|i| u16::try_from(i).ok().and_then(|i| base.checked_add(i)))
            .collect()
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Option<Duration> {
        self.proxy_timeout_secs.map(Duration::from_secs)
    }

    /// Settings handed to each worker
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            host: self.worker_host,
            command_timeout: self.command_timeout(),
            enable_request_logging: self.enable_request_logging,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_count".to_string(),
                reason: "Must spawn at least 1 worker".to_string(),
            });
        }

        if self.command_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "command_timeout_secs".to_string(),
                reason: "Timeout must be greater than zero".to_string(),
            });
        }

        if self.proxy_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "proxy_timeout_secs".to_string(),
                reason: "Timeout must be greater than zero when set".to_string(),
            });
        }

        if self.base_port() == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_base_port".to_string(),
                reason: "Workers need a fixed port; set worker_base_port".to_string(),
            });
        }

        if self.worker_ports().len() != self.worker_count {
            return Err(ConfigError::InvalidValue {
                field: "worker_count".to_string(),
                reason: format!(
                    "{} workers starting at port {} exceed the port range",
                    self.worker_count,
                    self.base_port()
                ),
            });
        }

        let public_port = self.bind_address.port();
        if self.worker_ports().contains(&public_port) {
            return Err(ConfigError::InvalidValue {
                field: "worker_base_port".to_string(),
                reason: format!("Worker ports overlap the public port {public_port}"),
            });
        }

        Ok(())
    }
}

/// Builder for CoordinatorConfig
#[derive(Debug, Default)]
pub struct CoordinatorConfigBuilder {
    bind_address: Option<SocketAddr>,
    worker_count: Option<usize>,
    worker_base_port: Option<u16>,
    worker_host: Option<IpAddr>,
    command_timeout_secs: Option<u64>,
    proxy_timeout_secs: Option<u64>,
    enable_request_logging: Option<bool>,
}

impl CoordinatorConfigBuilder {
    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address".to_string(),
            reason: format!("Invalid address: {}", addr),
        })?);
        Ok(self)
    }

    /// Set the number of workers
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Set the first worker port
    pub fn worker_base_port(mut self, port: u16) -> Self {
        self.worker_base_port = Some(port);
        self
    }

    pub fn worker_host(mut self, host: IpAddr) -> Self {
        self.worker_host = Some(host);
        self
    }

    /// Set command timeout
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.command_timeout_secs = Some(secs);
        self
    }

    /// Set proxy timeout
    pub fn proxy_timeout_secs(mut self, secs: u64) -> Self {
        self.proxy_timeout_secs = Some(secs);
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let defaults = CoordinatorConfig::default();
        let config = CoordinatorConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            worker_count: self.worker_count.unwrap_or(defaults.worker_count),
            worker_base_port: self.worker_base_port,
            worker_host: self.worker_host.unwrap_or(defaults.worker_host),
            command_timeout_secs: self
                .command_timeout_secs
                .unwrap_or(defaults.command_timeout_secs),
            proxy_timeout_secs: self.proxy_timeout_secs,
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
