use anyhow::{Context, Result};
use apigateway::{config::Config, handler::AppRouter, state::AppState};
use dotenv::dotenv;
use shared::utils::{Telemetry, init_logger};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::init().context("Failed to load configuration")?;

    let mut telemetry = Telemetry::new("apigateway", config.otel_endpoint.clone());

    let logger_provider = telemetry
        .init_logger()
        .context("Failed to initialize telemetry")?;

    init_logger(
        logger_provider,
        "apigateway",
        config.is_dev,
        config.enable_file_log,
    );

    info!(
        "Rate limiting with {} store, failure policy {:?}",
        config.store.label(),
        config.failure_policy
    );

    let state = AppState::new(&config)
        .await
        .context("Failed to create AppState")?;

    AppRouter::serve(config.port, state)
        .await
        .context("Failed to start server")?;

    info!("Shutting down servers...");

    telemetry.shutdown()?;

    Ok(())
}
