//! Pulsewatch Monitor
//!
//! Runs a single consumer's monitoring session until Ctrl-C. Reads
//! `CONSUMER_ID`, `THRESHOLD`, `TIMEFRAME`, `SCOPE` and `CATEGORY` from the
//! environment.

use dotenvy::dotenv;
use pulsewatch::config::{self, MonitorConfig};
use pulsewatch::core::MonitoringSupervisor;
use pulsewatch::db::PostgresStore;
use pulsewatch::logging;
use pulsewatch::models::{MarketCategory, MonitoringRequest, WatchScope, DEFAULT_TIMEFRAME};
use pulsewatch::services::stream::WebSocketConnector;
use pulsewatch::services::{
    BybitCatalogClient, FavoritesResolver, LogNotifier, Notifier, StaticFavorites,
    TelegramNotifier,
};
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let consumer_id: i64 = env::var("CONSUMER_ID")
        .map_err(|_| "CONSUMER_ID must be set")?
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("CONSUMER_ID is not a valid id: {}", e))?;
    let threshold: f64 = env::var("THRESHOLD")
        .ok()
        .map(|t| t.trim().parse::<f64>())
        .transpose()
        .map_err(|e| format!("THRESHOLD is not a number: {}", e))?
        .unwrap_or(5.0);
    let timeframe = env::var("TIMEFRAME").unwrap_or_else(|_| DEFAULT_TIMEFRAME.to_string());
    let scope: WatchScope = env::var("SCOPE")
        .ok()
        .map(|s| s.parse::<WatchScope>())
        .transpose()?
        .unwrap_or_default();
    let category: MarketCategory = env::var("CATEGORY")
        .ok()
        .map(|c| c.parse::<MarketCategory>())
        .transpose()?
        .unwrap_or_default();

    let request = MonitoringRequest::new(consumer_id, threshold, timeframe, scope, category)?;
    let monitor_config = MonitorConfig::from_env()?;

    info!("Starting Pulsewatch Monitor");
    info!(environment = %config::get_environment(), "Environment");

    let favorites: Arc<dyn FavoritesResolver> = match config::get_database_url() {
        Some(dsn) => {
            let store = PostgresStore::connect(&dsn).await?;
            if store.register_consumer(consumer_id).await? {
                info!(consumer_id, "Registered new consumer");
            }
            Arc::new(store)
        }
        None => {
            if scope == WatchScope::Favorites {
                warn!("SCOPE=favorites without DB_DSN - there will be nothing to monitor");
            }
            Arc::new(StaticFavorites::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match config::get_telegram_token() {
        Some(token) => Arc::new(TelegramNotifier::new(token)?),
        None => Arc::new(LogNotifier),
    };

    let catalog = Arc::new(BybitCatalogClient::new(
        monitor_config.rest_url.clone(),
        monitor_config.quote_suffix.clone(),
    ));

    let supervisor = MonitoringSupervisor::new(
        monitor_config,
        catalog,
        favorites,
        notifier,
        Arc::new(WebSocketConnector::new()),
    );

    supervisor.start(request).await?;

    info!("Monitoring running. Waiting for shutdown signal...");
    signal::ctrl_c().await?;
    info!("Shutting down monitor...");
    supervisor.stop(consumer_id).await;

    Ok(())
}
