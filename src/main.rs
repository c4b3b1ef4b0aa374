//! Postfix queue exporter
//!
//! Serves per-queue message counts, sizes and oldest-message ages read from
//! the Postfix showq socket. See `config.rs` for the environment variables.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use postfix_exporter::observability::{init_tracing, LogConfig};
use postfix_exporter::{serve, Exporter, ExporterConfig, ShowqCollector, UnixSocketConnector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&LogConfig::from_env());

    let config = ExporterConfig::load()?;
    let addr = config.listen_socket_addr()?;

    let connector = UnixSocketConnector::new(&config.showq_path);
    let collector = ShowqCollector::new(connector, config.scrape_options());
    let exporter = Arc::new(Exporter::new(collector).with_scrape_timeout(config.scrape_timeout()));

    info!(
        showq = %config.showq_path.display(),
        carry_over_fields = config.carry_over_fields,
        "Postfix exporter starting"
    );

    let listener = TcpListener::bind(addr).await?;
    serve(listener, exporter, config.metrics_path.as_str(), shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
