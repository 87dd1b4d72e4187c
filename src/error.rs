//! Unified error handling for the herd crate
//!
//! Each layer keeps its own error type ([`ServerError`], [`WorkerError`],
//! [`PoolError`], ...). This module folds them into a single [`Error`] for
//! callers that cross module boundaries, such as configuration loading and
//! the binary's commands.
//!
//! # Usage
//!
//! ```rust,ignore
//! use herd::error::{Error, Result};
//!
//! fn load() -> Result<herd::config::Config> {
//!     let config = herd::config::Config::from_env()?;
//!     config.validate()?;
//!     Ok(config)
//! }
//! ```

use std::io;
use thiserror::Error;

// Re-export domain-specific errors for convenience
pub use crate::coordinator::{BalancerError, ConfigError, PoolError, ServerError};
pub use crate::worker::{ExecuteError, WorkerError};

/// Unified error type for the herd crate
#[derive(Error, Debug)]
pub enum Error {
    /// Coordinator startup or serving errors
    #[error("Coordinator error: {0}")]
    Server(#[from] ServerError),

    /// Worker listener errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Worker pool errors
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    /// Invalid coordinator settings
    #[error("Coordinator config error: {0}")]
    CoordinatorConfig(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config file errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the error comes from bad settings rather than the runtime
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::CoordinatorConfig(_)
                | Self::Toml(_)
                | Self::Server(ServerError::Config(_))
        )
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
