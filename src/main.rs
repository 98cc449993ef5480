use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use vani_bridge::{AppState, ServerConfig, routes};

/// Vani Bridge - real-time telephony voice-agent bridge
#[derive(Parser, Debug)]
#[command(name = "vani-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config reads the environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vani_bridge=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port")?;
    let state = Arc::new(AppState::new(config));
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "vani-bridge listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
