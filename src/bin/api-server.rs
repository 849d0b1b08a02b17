//! Pulsewatch API Server
//!
//! HTTP control plane for starting and stopping per-consumer monitoring
//! sessions, plus health and Prometheus endpoints.

use dotenvy::dotenv;
use pulsewatch::config::{self, MonitorConfig};
use pulsewatch::core::http::{start_server, AppState, HealthStatus};
use pulsewatch::core::MonitoringSupervisor;
use pulsewatch::db::PostgresStore;
use pulsewatch::logging;
use pulsewatch::metrics::Metrics;
use pulsewatch::services::stream::WebSocketConnector;
use pulsewatch::services::{
    BybitCatalogClient, FavoritesResolver, LogNotifier, Notifier, StaticFavorites,
    TelegramNotifier,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let env = config::get_environment();
    info!("Starting Pulsewatch API Server");
    info!(environment = %env, "Environment");

    let monitor_config = MonitorConfig::from_env()?;
    let port = config::get_port()?;
    let metrics = Arc::new(Metrics::new()?);
    let health = Arc::new(RwLock::new(HealthStatus::default()));

    let favorites: Arc<dyn FavoritesResolver> = match config::get_database_url() {
        Some(dsn) => match PostgresStore::connect(&dsn).await {
            Ok(store) => {
                info!("Favorites store connected");
                metrics.database_connected.set(1.0);
                Arc::new(store)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to favorites store");
                warn!("Continuing without database - favorites scope will report no favorites");
                metrics.database_connected.set(0.0);
                health.write().await.degrade("favorites store unavailable");
                Arc::new(StaticFavorites::new())
            }
        },
        None => {
            warn!("DB_DSN not set - favorites scope will report no favorites");
            Arc::new(StaticFavorites::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match config::get_telegram_token() {
        Some(token) => Arc::new(TelegramNotifier::new(token)?),
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set - notifications go to the log");
            Arc::new(LogNotifier)
        }
    };

    let catalog = Arc::new(BybitCatalogClient::new(
        monitor_config.rest_url.clone(),
        monitor_config.quote_suffix.clone(),
    ));

    let supervisor = Arc::new(
        MonitoringSupervisor::new(
            monitor_config,
            catalog,
            favorites,
            notifier,
            Arc::new(WebSocketConnector::new()),
        )
        .with_metrics(metrics.clone()),
    );

    let state = AppState {
        health,
        metrics,
        start_time: Arc::new(Instant::now()),
        supervisor: supervisor.clone(),
    };

    start_server(state, port, async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutdown signal received");
    })
    .await?;

    supervisor.shutdown().await;
    info!("API server stopped");
    Ok(())
}
