use anyhow::{anyhow, Context};
use tokio::net::TcpListener;

use stockfolio_backend::app::create_app;
use stockfolio_backend::config::AppConfig;
use stockfolio_backend::logging::{init_logging, LoggingConfig};
use stockfolio_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let state = AppState::from_config(&config).context("Failed to build market data provider")?;
    let app = create_app(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("🚀 Stockfolio backend running at http://{}/", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
