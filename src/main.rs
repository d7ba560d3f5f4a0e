//! stubserve: serve canned HTTP responses and redirects described in a TOML file.
//!
//! ```text
//! stubserve --config stubs.toml --port 9000
//! ```

use std::path::PathBuf;

use clap::Parser;

use stubserve::config::{build_router, load_config, MockConfig};
use stubserve::lifecycle::signals::shutdown_signal;
use stubserve::observability::logging;
use stubserve::MockServer;

#[derive(Parser)]
#[command(name = "stubserve")]
#[command(about = "Programmable HTTP mock server", long_about = None)]
struct Cli {
    /// TOML file with [server], [logging], [[stubs]] and [[redirects]] sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Override `server.port`
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `logging.level`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MockConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging);
    tracing::info!("stubserve v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        stubs = config.stubs.len(),
        redirects = config.redirects.len(),
        max_connections = config.server.max_connections,
        "Configuration loaded"
    );

    let router = build_router(&config)?;
    let mut server = MockServer::new(config.server.clone(), router);
    let address = server.start()?;
    tracing::info!(address = %address, "Listening for connections");

    shutdown_signal().await?;
    server.stop()?;

    tracing::info!("Shutdown complete");
    Ok(())
}
