//! Storage bridge engine binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bridge_engine::config::{load_config, BridgeConfig};
use bridge_engine::lifecycle::wait_for_signal;
use bridge_engine::observability::{init_logging, init_metrics};
use bridge_engine::Engine;

#[derive(Parser)]
#[command(name = "bridge-engine")]
#[command(about = "Runtime supervisor for the storage bridge API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => BridgeConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.server.bind_address(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut engine = Engine::new(config);
    if let Err(e) = engine.start().await {
        tracing::error!(error = %e, "Failed to start bridge engine");
        return ExitCode::FAILURE;
    }

    wait_for_signal().await;
    engine.shutdown().await;
    ExitCode::SUCCESS
}
