use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

use parcel_dispatch::api;
use parcel_dispatch::config::{Config, LogFormat};
use parcel_dispatch::error::AppError;
use parcel_dispatch::models::service_center::ServiceCenters;
use parcel_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let service_centers = match config.service_centers_path.as_deref() {
        Some(path) => ServiceCenters::from_path(path)?,
        None => ServiceCenters::bundled()?,
    };
    tracing::info!(service_centers = service_centers.len(), "service centers loaded");

    let app_state = AppState::new(config.event_buffer_size, service_centers);
    app_state.seed_admins(&config.admin_emails);
    let shared_state = Arc::new(app_state);

    let app = api::rest::router(shared_state.clone()).layer(cors_layer(&config)?);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn cors_layer(config: &Config) -> Result<CorsLayer, AppError> {
    let Some(origin) = config.cors_allow_origin.as_deref() else {
        return Ok(CorsLayer::permissive());
    };

    let origin = origin
        .parse::<HeaderValue>()
        .map_err(|err| AppError::Internal(format!("invalid CORS_ALLOW_ORIGIN: {err}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
