//! # iomux Core Binary
//!
//! Mirrors four edge-triggered inputs onto four outputs and samples a bus
//! sensor and an interrupt-driven sensor into shared memory.
//!
//! # Usage
//!
//! ```bash
//! # Run with the configured backend
//! iomux_hal --config /etc/iomux/iomux.toml
//!
//! # Run without hardware
//! iomux_hal --config iomux.toml --simulate
//!
//! # Verbose JSON logging
//! iomux_hal -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use iomux_common::config::{ConfigLoader, LogLevel};
use iomux_common::consts::DEFAULT_CONFIG_PATH;
use iomux_common::mux::config::{MuxConfig, PinBackendKind};
use iomux_hal::{BackendRegistry, LifecycleController, MuxError};
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// iomux core - edge-driven pin mirroring and sensor sampling
#[derive(Parser, Debug)]
#[command(name = "iomux_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Edge-driven GPIO mirroring with bus and interrupt sensor sampling")]
#[command(long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Force the simulation pin backend
    #[arg(short = 's', long)]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("iomux failed: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(args: &Args) -> Result<(), MuxError> {
    let loaded = MuxConfig::load(&args.config);
    let level = loaded
        .as_ref()
        .map_or(LogLevel::default(), |config| config.shared.log_level);
    setup_tracing(args, level.as_tracing());

    info!("iomux core v{} starting...", env!("CARGO_PKG_VERSION"));
    let mut config = loaded?;
    info!("Loaded configuration from {}", args.config.display());

    if args.simulate {
        info!("Simulation mode enabled");
        config.pins.backend = PinBackendKind::Simulation;
    }

    let mut controller = LifecycleController::new(config, BackendRegistry::with_builtin())?;

    let shutdown = controller.shutdown_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        shutdown.request_shutdown();
    })?;

    controller.execute()?;
    info!("iomux shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from the configured level and CLI flags.
fn setup_tracing(args: &Args, configured: Level) {
    let level = if args.verbose { Level::DEBUG } else { configured };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
