use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use mail_template_builder::config::Settings;
use mail_template_builder::postgres::PostgresPool;
use mail_template_builder::server::{create_app, AppState};
use mail_template_builder::store::{create_template_repository, PostgresTemplateRepository};
use mail_template_builder::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("Failed to load configuration")?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.otel, &settings.logging)?;
    tracing::info!(storage = %settings.storage.backend, "Configuration loaded");

    // Connect to PostgreSQL when it backs the repository
    let postgres_pool = if settings.uses_postgres() {
        let pool = PostgresPool::new(&settings.database)
            .await
            .context("Failed to connect to PostgreSQL")?;
        PostgresTemplateRepository::new(pool.pool().clone())
            .ensure_schema()
            .await
            .context("Failed to prepare mail_templates schema")?;
        Some(Arc::new(pool))
    } else {
        None
    };

    let repository = create_template_repository(&settings.storage, postgres_pool.clone());

    // Create application state
    let state = AppState::new(settings.clone(), repository, postgres_pool.clone());
    state
        .image_store
        .ensure_dir()
        .await
        .context("Failed to create upload directory")?;
    tracing::info!(
        backend = state.repository.backend_name(),
        upload_dir = %state.image_store.dir().display(),
        components = state.registry.len(),
        "Application state initialized"
    );

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
