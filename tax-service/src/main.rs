use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tax_service::{AppState, ServiceConfig, logging, router};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tax-service")]
#[command(version, about = "Serve tax brackets and rebates over HTTP", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `[server] host`.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `[server] port`.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(&cli.config)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    logging::apply_config(&config.logging)?;

    let state = AppState::connect(&config).await?;
    let app = router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;
    info!(%address, "tax-service listening");

    axum::serve(listener, app).await.context("server error")
}
