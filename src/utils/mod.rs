//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod signal;

pub use signal::shutdown_signal;
