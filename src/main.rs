//! pollsense - run the rain forecast and travel time sensors from the shell

use anyhow::Context;
use clap::{Parser, Subcommand};
use pollsense::{
    config::{AppConfig, SensorConfig},
    host::{SensorRegistry, StateRegistry},
    logging::init_logging,
    platforms::{self, PlatformContext},
    services::{resolve, LocationReference},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Throttled remote-data sensors
#[derive(Parser, Debug)]
#[command(name = "pollsense")]
#[command(about = "Poll rain forecast and travel time sensors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file
    #[arg(long, short, global = true, env = "POLLSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file with host entity states
    #[arg(long, global = true, env = "POLLSENSE_STATES")]
    states: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and list the configured sensors
    Check,
    /// Set up every platform, run one fetch cycle and print the sensors
    Poll,
    /// Resolve a location string against the entity states
    Resolve {
        /// Coordinates, entity id or zone name
        location: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let mut log_config = config.logging.clone();
    log_config.apply_env();
    if cli.debug {
        log_config.level = "debug".to_string();
    }
    init_logging(log_config)?;

    let states = match &cli.states {
        Some(path) => StateRegistry::load_json_file(path)
            .await
            .with_context(|| format!("Failed to load entity states from {path:?}"))?,
        None => StateRegistry::new(),
    };

    match cli.command {
        Command::Check => {
            let sensors: Vec<_> = config
                .sensors
                .iter()
                .map(|sensor| match sensor {
                    SensorConfig::MeteoFrance(cfg) => json!({
                        "platform": sensor.platform(),
                        "name": platforms::sensor_name(sensor),
                        "location_id": cfg.location_id,
                    }),
                    SensorConfig::WazeTravelTime(cfg) => json!({
                        "platform": sensor.platform(),
                        "name": platforms::sensor_name(sensor),
                        "origin": LocationReference::parse(&cfg.origin),
                        "destination": LocationReference::parse(&cfg.destination),
                        "region": cfg.region,
                    }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sensors)?);
        }
        Command::Poll => {
            let ctx = PlatformContext::new(Arc::new(states), config.http.clone())?;
            let registry = SensorRegistry::new();
            let ready = platforms::setup_all(&config, &ctx, &registry).await;
            info!("{ready} platforms set up, {} sensors registered", registry.len());
            println!("{}", serde_json::to_string_pretty(&registry.snapshots())?);
        }
        Command::Resolve { location } => {
            let reference = LocationReference::parse(&location);
            let output = match resolve(&reference, &states) {
                Ok(resolved) => json!({
                    "reference": reference,
                    "resolved": resolved.as_query(),
                }),
                Err(e) => json!({
                    "reference": reference,
                    "error": e.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
