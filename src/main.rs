use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod models;
mod utils;
mod state;

use crate::utils::conf_helper::{bind_and_cache, get_cached_config, ingest_mode_of, load_config};
use crate::state::app_state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config().await?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let mode = ingest_mode_of(&config)?;
    let state = AppState::new(
        mode,
        config.storage.data_dir.clone(),
        config.storage.upload_dir.clone(),
        config.storage.counter_file.clone(),
    );

    // === CONFIG + LISTENER ===
    let listener = bind_and_cache(config).await?;

    let config = get_cached_config();

    info!(
        "{} v{} listening on {}:{} (ingest mode: {})",
        config.name,
        config.version,
        config.connection.ip,
        config.connection.port,
        mode.as_str()
    );

    let app = Router::new()
        .merge(routes::info_routes::health_routes())
        .merge(routes::data_routes::data_routes(state));

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
