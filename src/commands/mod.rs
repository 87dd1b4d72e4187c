pub mod cluster;
pub mod serve;
pub mod worker;

// Re-export command functions for convenience
pub use cluster::{cluster, ClusterParams};
pub use serve::serve;
pub use worker::{worker, WorkerParams};
