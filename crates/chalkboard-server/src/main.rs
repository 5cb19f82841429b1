//! Chalkboard WebSocket Server
//!
//! Usage: `chalkboard-server <address> <port> <name>`
//!
//! `<name>` is the operator's display name. A client joining under it is
//! admitted directly; anyone else is approved from this console.

use chalkboard_server::{ChannelApproval, ServerConfig, ServerError, WhiteboardServer, operator, router};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Pending approval requests buffered for the console.
const APPROVAL_QUEUE: usize = 16;

#[derive(Parser, Debug)]
#[command(name = "chalkboard-server", version, about = "Shared whiteboard server")]
struct Cli {
    /// Address to bind, e.g. 0.0.0.0
    address: String,

    /// Port to listen on
    port: u16,

    /// Operator display name
    name: String,

    /// Milliseconds between liveness rounds
    #[arg(long, env = "CHALKBOARD_PING_INTERVAL_MS", default_value_t = 1000)]
    ping_interval_ms: u64,

    /// Milliseconds a client has to answer a ping
    #[arg(long, env = "CHALKBOARD_PING_TIMEOUT_MS", default_value_t = 3000)]
    ping_timeout_ms: u64,

    /// Seconds to wait for the operator before denying a join
    #[arg(long, env = "CHALKBOARD_ADMISSION_TIMEOUT_SECS", default_value_t = 60)]
    admission_timeout_secs: u64,

    /// Outbound messages buffered per client
    #[arg(long, env = "CHALKBOARD_QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "chalkboard_server=info,tower_http=info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            bind_address: self.address.clone(),
            port: self.port,
            operator_name: self.name.clone(),
            ping_interval: Duration::from_millis(self.ping_interval_ms),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            admission_timeout: Duration::from_secs(self.admission_timeout_secs),
            queue_capacity: self.queue_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .init();

    let config = cli.config();
    let (approval, approvals) = ChannelApproval::new(APPROVAL_QUEUE);
    let server = WhiteboardServer::new(config, Arc::new(approval))?;

    let listener = TcpListener::bind((cli.address.as_str(), cli.port)).await?;
    let addr = listener.local_addr()?;
    info!("Chalkboard server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!(operator = %cli.name, "Operator console ready, type `help` for commands");

    let liveness = server.spawn_liveness();
    tokio::spawn(operator::run_console(Arc::clone(&server), approvals));

    let result = axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    liveness.abort();
    result?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
