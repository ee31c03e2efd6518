//! Code Canvas Gateway Binary
//!
//! Standalone host runtime for the code canvas sandbox.
//!
//! # Usage
//! ```bash
//! canvas-gateway [--config canvas.toml] [--port 18790] [--host 127.0.0.1] [--verbose]
//! ```

use canvas_core::CanvasConfig;
use canvas_gateway::GatewayServer;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Code Canvas Gateway - sandboxed HTML/CSS/JS preview over WebSocket
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the configuration)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides the configuration)
    #[arg(long)]
    host: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(args.verbose)
        .init();

    let mut config = match &args.config {
        Some(path) => CanvasConfig::from_file(path)?,
        None => CanvasConfig::default(),
    };
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    config.validate()?;

    tracing::info!(
        "Serving the canvas on http://{}:{}",
        config.gateway.host,
        config.gateway.port
    );

    let server = Arc::new(GatewayServer::new(config));
    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_server.shutdown();
        }
    });

    server.start().await?;
    Ok(())
}
