use anyhow::{Context, Result};

use herd::config::Config;
use herd::coordinator::{CoordinatorServer, ProcessPool, TaskPool, WorkerPool};
use herd::worker::WorkerConfig;

/// Configuration parameters for the coordinator
pub struct ClusterParams {
    pub config: Config,
    pub in_process: bool,
    pub verbose: bool,
}

/// Start the coordinator and its workers
pub async fn cluster(params: ClusterParams) -> Result<()> {
    let ClusterParams {
        config,
        in_process,
        verbose,
    } = params;

    let coordinator_config = config
        .coordinator_config()
        .context("Invalid coordinator configuration")?;

    if in_process {
        let pool = TaskPool::new(coordinator_config.worker_config());
        run(CoordinatorServer::new(coordinator_config, pool)?).await
    } else {
        let args = worker_args(
            &coordinator_config.worker_config(),
            &config.logging.format,
            verbose,
        );
        let pool =
            ProcessPool::current_exe(args).context("Failed to prepare worker processes")?;
        run(CoordinatorServer::new(coordinator_config, pool)?).await
    }
}

async fn run<P: WorkerPool>(server: CoordinatorServer<P>) -> Result<()> {
    println!("{}", server.info().display());
    println!();

    let running = server
        .launch()
        .await
        .context("Failed to start coordinator")?;

    for (index, worker) in running.workers().iter().enumerate() {
        match worker.pid {
            Some(pid) => println!("  Worker {index}: pid {pid}, port {}", worker.port),
            None => println!("  Worker {index}: port {}", worker.port),
        }
    }
    println!();
    println!("Balancer listening on http://{}", running.local_addr());
    println!("Press Ctrl+C to stop.\n");

    running
        .serve(herd::utils::shutdown_signal())
        .await
        .context("Coordinator failed")?;

    println!("Coordinator stopped.");
    Ok(())
}

/// Command line for every worker child process
fn worker_args(worker: &WorkerConfig, log_format: &str, verbose: bool) -> Vec<String> {
    let mut args = vec![
        "worker".to_string(),
        "--host".to_string(),
        worker.host.to_string(),
        "--command-timeout".to_string(),
        worker.command_timeout.as_secs().to_string(),
        "--log-format".to_string(),
        log_format.to_string(),
    ];
    if !worker.enable_request_logging {
        args.push("--no-request-logging".to_string());
    }
    if verbose {
        args.push("--verbose".to_string());
    }
    args
}
