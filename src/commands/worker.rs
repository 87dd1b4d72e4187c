use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use herd::worker::{run_worker, WorkerChannel, WorkerConfig};

/// Configuration parameters for a clustered worker
pub struct WorkerParams {
    pub host: IpAddr,
    pub command_timeout: u64,
    pub request_logging: bool,
}

/// Run as a child of the coordinator
///
/// Nothing may be printed to stdout here; it carries the IPC channel.
pub async fn worker(params: WorkerParams) -> Result<()> {
    let WorkerParams {
        host,
        command_timeout,
        request_logging,
    } = params;

    let config = WorkerConfig {
        host,
        command_timeout: Duration::from_secs(command_timeout),
        enable_request_logging: request_logging,
    };

    tracing::debug!(pid = std::process::id(), ?config, "worker process starting");
    run_worker(WorkerChannel::stdio(), config)
        .await
        .context("Worker failed")?;

    Ok(())
}
