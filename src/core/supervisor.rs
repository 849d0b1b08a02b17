//! Per-consumer orchestration of monitoring sessions.

use super::chunks::partition;
use super::cooldown::CooldownStore;
use super::session::{ChunkOutcome, Session, SessionSummary};
use crate::config::MonitorConfig;
use crate::error::SupervisorError;
use crate::metrics::Metrics;
use crate::models::{MonitoringRequest, WatchScope};
use crate::services::catalog::InstrumentCatalog;
use crate::services::favorites::FavoritesResolver;
use crate::services::notifier::Notifier;
use crate::services::stream::{MonitorContext, StreamConnector};
use crate::ConsumerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const STOPPED_MESSAGE: &str = "Monitoring stopped";
pub const NO_SESSION_MESSAGE: &str = "No active monitoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { streams: usize },
    NoActiveSession,
}

pub struct MonitoringSupervisor {
    config: MonitorConfig,
    catalog: Arc<dyn InstrumentCatalog>,
    favorites: Arc<dyn FavoritesResolver>,
    notifier: Arc<dyn Notifier>,
    connector: Arc<dyn StreamConnector>,
    cooldowns: Arc<CooldownStore>,
    metrics: Option<Arc<Metrics>>,
    sessions: Mutex<HashMap<ConsumerId, Session>>,
}

impl MonitoringSupervisor {
    pub fn new(
        config: MonitorConfig,
        catalog: Arc<dyn InstrumentCatalog>,
        favorites: Arc<dyn FavoritesResolver>,
        notifier: Arc<dyn Notifier>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        let cooldowns = Arc::new(CooldownStore::new(config.cooldown_millis()));
        Self {
            config,
            catalog,
            favorites,
            notifier,
            connector,
            cooldowns,
            metrics: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &Arc<CooldownStore> {
        &self.cooldowns
    }

    /// Instruments the request asks for. Empty results are errors here so
    /// that `start` never creates an empty session.
    pub async fn resolve_symbols(
        &self,
        request: &MonitoringRequest,
    ) -> Result<Vec<String>, SupervisorError> {
        match request.scope {
            WatchScope::AllActive => {
                let symbols = self.catalog.fetch_active(request.category).await?;
                if symbols.is_empty() {
                    return Err(SupervisorError::NoInstruments);
                }
                Ok(symbols)
            }
            WatchScope::Favorites => {
                let symbols = self
                    .favorites
                    .fetch_favorites(request.consumer_id)
                    .await
                    .map_err(|source| SupervisorError::Favorites {
                        consumer_id: request.consumer_id,
                        source,
                    })?;
                if symbols.is_empty() {
                    return Err(SupervisorError::NoFavorites(request.consumer_id));
                }
                Ok(symbols)
            }
        }
    }

    /// Start monitoring for `request.consumer_id`, replacing and awaiting
    /// any session it already had.
    pub async fn start(
        &self,
        request: MonitoringRequest,
    ) -> Result<SessionSummary, SupervisorError> {
        let consumer_id = request.consumer_id;

        let symbols = match self.resolve_symbols(&request).await {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!(consumer_id, error = %e, "Monitoring not started");
                self.notifier.deliver(consumer_id, e.user_message()).await;
                return Err(e);
            }
        };

        let chunks = partition(&symbols, self.config.chunk_size);
        let ctx = Arc::new(MonitorContext {
            consumer_id,
            threshold: request.threshold,
            timeframe: request.timeframe.clone(),
            interval: request.topic_interval().to_string(),
            url: self.config.stream_url(request.category).to_string(),
            read_timeout: self.config.read_timeout,
            heartbeat_interval: self.config.heartbeat_interval,
            connector: self.connector.clone(),
            cooldowns: self.cooldowns.clone(),
            notifier: self.notifier.clone(),
            metrics: self.metrics.clone(),
        });

        let session = Session::spawn(request, chunks, ctx);
        let summary = session.summary();

        let previous = {
            let mut sessions = self.sessions.lock().await;
            let previous = sessions.insert(consumer_id, session);
            if let Some(previous) = &previous {
                previous.cancel();
            }
            self.record_session_count(sessions.len());
            previous
        };

        info!(
            consumer_id,
            instruments = summary.instruments,
            streams = summary.streams,
            threshold = summary.threshold,
            timeframe = %summary.timeframe,
            "Monitoring started"
        );
        self.notifier
            .deliver(
                consumer_id,
                &format!(
                    "Monitoring started: {} instruments across {} streams (threshold {:.2}%, timeframe {})",
                    summary.instruments, summary.streams, summary.threshold, summary.timeframe
                ),
            )
            .await;

        if let Some(previous) = previous {
            info!(consumer_id, "Replaced previous monitoring session");
            previous.join().await;
        }

        Ok(summary)
    }

    /// Cancel and remove the consumer's session. Safe to call repeatedly.
    pub async fn stop(&self, consumer_id: ConsumerId) -> StopOutcome {
        let removed = {
            let mut sessions = self.sessions.lock().await;
            let removed = sessions.remove(&consumer_id);
            if let Some(session) = &removed {
                session.cancel();
            }
            self.record_session_count(sessions.len());
            removed
        };

        match removed {
            Some(session) => {
                let streams = session.streams();
                let failed = session
                    .join()
                    .await
                    .iter()
                    .filter(|outcome| !matches!(outcome, ChunkOutcome::Cancelled))
                    .count();
                info!(consumer_id, streams, failed, "Monitoring stopped");
                self.notifier.deliver(consumer_id, STOPPED_MESSAGE).await;
                StopOutcome::Stopped { streams }
            }
            None => {
                self.notifier.deliver(consumer_id, NO_SESSION_MESSAGE).await;
                StopOutcome::NoActiveSession
            }
        }
    }

    pub async fn is_active(&self, consumer_id: ConsumerId) -> bool {
        self.sessions.lock().await.contains_key(&consumer_id)
    }

    pub async fn active_sessions(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.lock().await;
        let mut summaries: Vec<SessionSummary> =
            sessions.values().map(Session::summary).collect();
        summaries.sort_by_key(|s| s.consumer_id);
        summaries
    }

    /// Stop every session and wait for all chunk tasks to exit.
    pub async fn shutdown(&self) {
        let drained: Vec<Session> = {
            let mut sessions = self.sessions.lock().await;
            let drained: Vec<Session> = sessions.drain().map(|(_, s)| s).collect();
            for session in &drained {
                session.cancel();
            }
            self.record_session_count(0);
            drained
        };

        let count = drained.len();
        for session in drained {
            session.join().await;
        }
        info!(sessions = count, "All monitoring sessions stopped");
    }

    fn record_session_count(&self, count: usize) {
        if let Some(m) = &self.metrics {
            m.active_sessions.set(count as i64);
        }
    }
}
