//! Integration tests module
//!
//! End-to-end tests for the herd cluster:
//! - Round-robin proxying and proxy failure handling
//! - CRUD through the balancer with a shared store
//! - Command forwarding between workers and the dispatcher
//! - Worker child processes of the `herd` binary

pub mod balancer_test;
pub mod cluster_test;
pub mod fixtures;
pub mod ipc_test;
pub mod process_test;
