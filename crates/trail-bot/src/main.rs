//! trailbot - trailing-order spot trading bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Trailing-order spot trading bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TRAILBOT_CONFIG)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    trail_bot::init_logging();
    info!("Starting trailbot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("TRAILBOT_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());
    info!(config_path = %config_path, "Loading configuration");

    let config = trail_bot::AppConfig::from_file(&config_path)?;
    config.precheck()?;
    info!(symbol = %config.symbol, "Configuration loaded");

    let mut app = trail_bot::Application::new(config)?;
    app.preload().await?;
    app.run().await?;

    info!("trailbot terminated");
    Ok(())
}
