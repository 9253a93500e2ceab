//! R0N Allowlist binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use r0n_allowlist::adapter::AdapterRegistry;
use r0n_allowlist::config::{config_path, BasicValidator, ConfigLoader, ResourceValidator};
use r0n_allowlist::engine::Engine;
use r0n_allowlist::telemetry;

/// Per-user network allow-list reconciliation engine.
#[derive(Debug, Parser)]
#[command(name = "r0n-allowlist", version, about)]
struct Cli {
    /// Configuration file (defaults to $CONFIG_FILE, then config/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = config_path(cli.config.as_deref());

    let loader = ConfigLoader::new()
        .with_env_overrides()
        .with_validator(BasicValidator::new())
        .with_validator(ResourceValidator::new());
    let config = match loader.load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("r0n-allowlist: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = telemetry::init(&config.logging) {
        eprintln!("r0n-allowlist: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }
    info!(version = env!("CARGO_PKG_VERSION"), config = %path.display(), "Starting");

    let registry = AdapterRegistry::dry_run();
    let mut engine = match Engine::from_config(&config, &registry) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = engine.start().await {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown requested");
    engine.shutdown().await;

    ExitCode::SUCCESS
}
