use actix_web::web;
use tracing_subscriber::EnvFilter;

use crate::domain::error::{AppError, Result};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::connect_repository;
use crate::interfaces::http::{start_server, HttpState};

pub async fn run() -> Result<()> {
    let config = AppConfig::load()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    tracing::info!(
        backend = ?config.database.backend,
        id_policy = ?config.ingest.id_policy,
        "Starting pricehub"
    );

    let repository = connect_repository(&config.database).await.map_err(|err| {
        tracing::error!(error = %err, "Failed to open price store");
        err
    })?;

    let state = web::Data::new(HttpState::new(repository, &config.ingest));
    let server = start_server(state, &config.server).map_err(|e| {
        tracing::error!(
            error = %e,
            host = %config.server.host,
            port = config.server.port,
            "Failed to bind HTTP server"
        );
        AppError::IoError(format!("Failed to bind HTTP server: {}", e))
    })?;

    server.await.map_err(|e| {
        tracing::error!(error = %e, "HTTP server stopped with an error");
        AppError::Internal(format!("HTTP server failed: {}", e))
    })
}
