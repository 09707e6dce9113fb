//! Main entry point for the styleset agent

use std::sync::Arc;
use styleset_agent::{api, config::Settings, AppState};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }

    settings.validate()?;
    info!(
        host = %settings.server.host,
        port = settings.server.port,
        model = %settings.provider.model,
        keys = settings.provider.api_keys.len(),
        "Starting styleset agent"
    );

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let scheduler = settings.scheduler.clone();

    let state = Arc::new(AppState::from_settings(settings).await?);

    if scheduler.enabled {
        state.cron.start(scheduler.tick_interval_secs).await;
    }

    let app = api::create_router(state.clone());

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    state.cron.stop().await;
    Ok(())
}
