// Copyright (C) 2025 Permiso Digital
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Permiso Server - HTTP API for the folio lifecycle engine.
//!
//! Wires the lifecycle controller over PostgreSQL, the in-memory deadline
//! registry, and the Telegram notification adapter, then serves the JSON API.

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

use permiso_core::config::Config;
use permiso_core::lifecycle::LifecycleController;
use permiso_core::notify::{NotificationSink, NullNotificationSink};
use permiso_core::persistence::PostgresFolioStore;
use permiso_core::registry::TimerRegistry;
use permiso_server::config::ServerConfig;
use permiso_server::telegram::TelegramNotifier;
use permiso_server::{AppState, router};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("permiso_core=info".parse().unwrap())
                .add_directive("permiso_server=info".parse().unwrap()),
        )
        .init();

    info!("Starting Permiso Server");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    let server_config = ServerConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %server_config.http_addr,
        entidad = %config.entidad,
        folio_prefix = %config.folio_prefix,
        pending_ttl_secs = config.pending_ttl.as_secs(),
        "Configuration loaded"
    );

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    info!("Database connection established");

    // Verify connection
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&pool).await?;
    info!(result = row.0, "Database health check passed");

    info!("Running database migrations...");
    permiso_core::migrations::run_postgres(&pool).await?;
    info!("Migrations completed");

    // Assemble the lifecycle engine
    let store = Arc::new(PostgresFolioStore::new(pool.clone()));
    let registry = Arc::new(TimerRegistry::new(config.pending_ttl));
    let notifier: Arc<dyn NotificationSink> = match server_config.bot_token.clone() {
        Some(token) => Arc::new(TelegramNotifier::new(token)),
        None => {
            warn!("PERMISO_BOT_TOKEN not set, expiry notifications are disabled");
            Arc::new(NullNotificationSink)
        }
    };
    let controller = Arc::new(LifecycleController::new(
        config.clone(),
        store.clone(),
        registry.clone(),
        notifier,
    ));

    let state = AppState {
        controller,
        store,
        registry,
        entidad: config.entidad.clone(),
        timezone: config.timezone,
    };

    info!("Permiso Server initialized successfully");

    let listener = tokio::net::TcpListener::bind(server_config.http_addr).await?;
    info!(addr = %server_config.http_addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Permiso Server stopped");
    Ok(())
}

/// Resolve when the process receives a termination signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
