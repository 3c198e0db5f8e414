//! shutdown-gate demo server.
//!
//! Serves a few routes behind the shutdown gate. SIGINT/SIGTERM or a panic
//! puts the server into draining mode: new requests get 503, in-flight
//! requests get up to `shutdown.timeout_ms` to finish, then the process exits.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use shutdown_gate::config::{load_config, AppConfig};
use shutdown_gate::http::{DrainOutcome, HttpServer, Renderer, StaticTemplates};
use shutdown_gate::lifecycle::Coordinator;
use shutdown_gate::observability;

#[derive(Parser)]
#[command(name = "shutdown-gate")]
#[command(about = "HTTP server with graceful, gated shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    observability::logging::init(&config.observability);
    tracing::info!("shutdown-gate v0.1.0 starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let mut builder = Coordinator::builder(config.shutdown.clone());
    if let Some(dir) = &config.templates.dir {
        let templates: Arc<dyn Renderer> = Arc::new(StaticTemplates::from_dir(dir)?);
        builder = builder.renderer(templates);
    }
    let coordinator = builder.build()?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        timeout_ms = config.shutdown.timeout_ms,
        template = ?config.shutdown.template,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, coordinator);
    let outcome = server.run(listener).await?;

    // Host cleanup runs here, inside the drain window.
    tracing::info!("Running cleanup");

    match outcome {
        DrainOutcome::Completed => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
        DrainOutcome::TimedOut => {
            tracing::error!("Forcing exit after drain timeout");
            std::process::exit(1);
        }
    }
}
