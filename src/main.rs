//! Authentication server
//!
//! Environment:
//!   DATABASE_URL    PostgreSQL connection string (required)
//!   BIND_ADDR       Listen address (default: 0.0.0.0:5001)
//!   DB_MAX_CONNECTIONS  Pool size (default: 10)
//!   plus the `JWT_*` and tuning variables read by `AuthConfig::from_env`

use auth_core::{create_routes, logging, middleware, AuthConfig, AuthService, PgStore};

use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    logging::init();

    if let Err(e) = run().await {
        tracing::error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Missing or invalid signing keys are fatal before anything is served
    let config = AuthConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(config.storage_timeout)
        .connect(&database_url)
        .await?;
    tracing::info!("Database connection established");

    let store = Arc::new(PgStore::new(pool.clone()).with_call_timeout(config.storage_timeout));
    store.migrate().await?;

    let auth = Arc::new(AuthService::new(config, store.clone(), store)?);

    let app = middleware::security_headers(create_routes(auth)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)),
    );

    let bind: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server running at http://{}", bind);
    tracing::info!("API index available at /api/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Database connection closed");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
