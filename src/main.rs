use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herd::config::Config;

mod commands;

use commands::{cluster, serve, worker, ClusterParams, WorkerParams};

#[derive(Parser)]
#[command(
    name = "herd",
    version,
    about = "Clustered in-memory user store behind a round-robin balancer",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML config file; environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the user API from a single process with its own store
    Serve {
        /// Listen port (overrides USERS_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the coordinator and its worker pool
    Cluster {
        /// Public balancer port (overrides MULTI_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of workers (overrides HERD_WORKERS)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Run workers as tasks in this process instead of child processes
        #[arg(long, default_value = "false")]
        in_process: bool,
    },

    /// Run one clustered worker speaking to its parent over stdin/stdout
    #[command(hide = true)]
    Worker {
        /// Interface to listen on once a port is assigned
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,

        /// Seconds to wait for the coordinator's reply
        #[arg(long, default_value = "10")]
        command_timeout: u64,

        /// Disable per-request logging
        #[arg(long, default_value = "false")]
        no_request_logging: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli));

    // A worker's stdin reader is parked in a blocking read that cannot be
    // cancelled, so the runtime must not wait for its blocking threads.
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    // Worker stdout carries the IPC channel, so its logs go to stderr.
    let is_worker = matches!(cli.command, Commands::Worker { .. });
    setup_tracing(&config, cli.verbose, is_worker)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.standalone_port = port;
            }
            config.validate()?;
            tracing::info!(port = config.server.standalone_port, "Starting serve command");
            serve(&config).await?;
        }

        Commands::Cluster {
            port,
            workers,
            in_process,
        } => {
            if let Some(port) = port {
                config.server.balancer_port = port;
            }
            if let Some(workers) = workers {
                config.cluster.workers = workers;
            }
            config.validate()?;
            tracing::info!(
                port = config.server.balancer_port,
                workers = config.cluster.workers,
                in_process,
                "Starting cluster command"
            );
            cluster(ClusterParams {
                config,
                in_process,
                verbose: cli.verbose,
            })
            .await?;
        }

        Commands::Worker {
            host,
            command_timeout,
            no_request_logging,
        } => {
            worker(WorkerParams {
                host,
                command_timeout,
                request_logging: !no_request_logging,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(config: &Config, verbose: bool, to_stderr: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("herd=debug,tower_http=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_new(format!("herd={},warn", config.logging.level))
            .context("Invalid log level")?
    };

    let writer = if to_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(writer))
                .init();
        }
    }

    Ok(())
}
