use clap::Args;
use tracing::info;

use crate::app::{app, AppState};
use crate::config::{AppConfig, StoreBackend};

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "Port to listen on (overrides BRANDHUB_PORT/PORT)")]
    pub port: Option<u16>,

    #[arg(long, help = "Use the in-memory store instead of PostgreSQL")]
    pub memory: bool,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let mut config: AppConfig = crate::config::config().clone();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if args.memory {
        config.database.backend = StoreBackend::Memory;
    }
    config.validate()?;

    info!("Starting BrandHub API in {:?} mode", config.environment);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let state = AppState::from_config(config).await?;
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("BrandHub API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
