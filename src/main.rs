use anyhow::Result;
use skinx_server::{config, server};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Parses a log level or `RUST_LOG`-style directive list into a filter
fn parse_log_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|_| {
        anyhow::anyhow!(
            "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
            level
        )
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration comes first so its log level can seed the subscriber
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Environment variable overrides config
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.server.logs.level.clone());

    let filter = match parse_log_filter(&log_level) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting SkinX server with log level: {}", log_level);
    info!("Configuration loaded successfully");

    server::run(config).await?;

    Ok(())
}
