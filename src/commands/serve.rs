use anyhow::{Context, Result};

use herd::config::Config;
use herd::utils::shutdown_signal;
use herd::worker::WorkerServer;

/// Serve the user API from this process alone
pub async fn serve(config: &Config) -> Result<()> {
    let addr = config.standalone_address();

    println!("Starting Standalone Server");
    println!("==========================");
    println!("  Address: {addr}");
    println!(
        "  Request Logging: {}",
        if config.cluster.request_logging {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();
    println!("API Endpoints:");
    println!("  GET    /api/users      - List users");
    println!("  GET    /api/users/{{id}} - Get user by id");
    println!("  POST   /api/users      - Create user");
    println!("  PUT    /api/users/{{id}} - Replace user");
    println!("  DELETE /api/users/{{id}} - Delete user");
    println!();
    println!("Press Ctrl+C to stop.\n");

    WorkerServer::standalone(addr)
        .with_request_logging(config.cluster.request_logging)
        .start_with_shutdown(shutdown_signal())
        .await
        .context("Standalone server failed")?;

    println!("Standalone server stopped.");
    Ok(())
}
