//! WolfDrop - Signed Upload Gateway
//!
//! Accepts HMAC-signed uploads and serves them from S3-compatible storage.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfdrop::api::HttpServer;
use wolfdrop::config::GatewayConfig;
use wolfdrop::error::Result;
use wolfdrop::storage;

/// WolfDrop - Signed Upload Gateway
#[derive(Parser)]
#[command(name = "wolfdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "./config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match GatewayConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!("Failed to load config {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };

    // Initialize logging
    init_logging(&config.logging.level);

    tracing::info!("Starting WolfDrop...");
    tracing::info!("  Config: {:?}", cli.config);
    tracing::info!("  S3 endpoint: {}", config.endpoint_url());
    tracing::info!("  Bucket: {}", config.s3.bucket);
    tracing::info!(
        "  Downloads: {}",
        if config.server.proxy_mode { "proxied" } else { "redirected" }
    );

    let store = match storage::connect(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to connect to object storage: {}", e);
            return Err(e);
        }
    };

    let server = HttpServer::new(&config, store);
    server.start().await
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
