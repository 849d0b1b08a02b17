//! Per-chunk stream consumer: subscribe, read, score, debounce, alert.

use super::connection::{StreamConnection, StreamConnector};
use super::messages::{kline_topic, ControlRequest};
use crate::core::cooldown::{CooldownKey, CooldownStore};
use crate::core::signal::{evaluate_frame, FrameOutcome, SkipReason};
use crate::error::MonitorError;
use crate::metrics::Metrics;
use crate::models::PriceAlert;
use crate::services::notifier::Notifier;
use crate::ConsumerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the monitors of one session share.
pub struct MonitorContext {
    pub consumer_id: ConsumerId,
    pub threshold: f64,
    pub timeframe: String,
    /// Interval segment of the kline topic ("15" for "15m").
    pub interval: String,
    pub url: String,
    pub read_timeout: Duration,
    /// Zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    pub connector: Arc<dyn StreamConnector>,
    pub cooldowns: Arc<CooldownStore>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Option<Arc<Metrics>>,
}

pub struct StreamMonitor {
    ctx: Arc<MonitorContext>,
    symbols: Vec<String>,
}

impl StreamMonitor {
    pub fn new(ctx: Arc<MonitorContext>, symbols: Vec<String>) -> Self {
        Self { ctx, symbols }
    }

    pub fn topics(&self) -> Vec<String> {
        self.symbols
            .iter()
            .map(|symbol| kline_topic(&self.ctx.interval, symbol))
            .collect()
    }

    /// Run until cancelled (`Ok`) or until the connection fails (`Err`).
    /// Nothing is retried here; restarting is up to the consumer.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), MonitorError> {
        let consumer_id = self.ctx.consumer_id;
        debug!(consumer_id, symbols = ?self.symbols, url = %self.ctx.url, "Stream monitor starting");

        let mut conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            conn = self.ctx.connector.connect(&self.ctx.url) => conn.map_err(MonitorError::Connect)?,
        };

        let result = self.consume(conn.as_mut(), &cancel).await;
        conn.close().await;

        match &result {
            Ok(()) => debug!(consumer_id, symbols = ?self.symbols, "Stream monitor cancelled"),
            Err(e) => warn!(consumer_id, symbols = ?self.symbols, error = %e, "Stream monitor terminated"),
        }
        result
    }

    async fn consume(
        &self,
        conn: &mut dyn StreamConnection,
        cancel: &CancellationToken,
    ) -> Result<(), MonitorError> {
        let subscribe = serde_json::to_string(&ControlRequest::subscribe(self.topics()))?;
        conn.send_text(subscribe)
            .await
            .map_err(MonitorError::Subscribe)?;
        info!(
            consumer_id = self.ctx.consumer_id,
            streams = self.symbols.len(),
            "Subscribed to {}",
            self.symbols.join(", ")
        );

        let ping = serde_json::to_string(&ControlRequest::ping())?;
        let mut heartbeat = (!self.ctx.heartbeat_interval.is_zero()).then(|| {
            let period = self.ctx.heartbeat_interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        let read_timeout = self.ctx.read_timeout;
        let idle = tokio::time::sleep(read_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = &mut idle => return Err(MonitorError::ReadTimeout(read_timeout.as_secs())),
                _ = async {
                    match heartbeat.as_mut() {
                        Some(ticker) => { ticker.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    conn.send_text(ping.clone())
                        .await
                        .map_err(MonitorError::Heartbeat)?;
                }
                frame = conn.next_text() => {
                    idle.as_mut().reset(Instant::now() + read_timeout);
                    match frame {
                        Some(Ok(text)) => self.handle_frame(&text, cancel).await,
                        Some(Err(e)) => return Err(MonitorError::Read(e)),
                        None => return Err(MonitorError::ServerClosed),
                    }
                }
            }
        }
    }

    async fn handle_frame(&self, text: &str, cancel: &CancellationToken) {
        match evaluate_frame(text, self.ctx.threshold) {
            FrameOutcome::Skipped(SkipReason::Malformed) => {
                if let Some(m) = &self.ctx.metrics {
                    m.stream_decode_errors_total.inc();
                }
                debug!(consumer_id = self.ctx.consumer_id, raw = %text, "Dropping undecodable frame");
            }
            FrameOutcome::Skipped(reason) => {
                debug!(consumer_id = self.ctx.consumer_id, reason = ?reason, "Skipping frame");
            }
            FrameOutcome::BelowThreshold { .. } => {
                if let Some(m) = &self.ctx.metrics {
                    m.stream_updates_total.inc();
                }
            }
            FrameOutcome::Crossed(alert) => {
                if let Some(m) = &self.ctx.metrics {
                    m.stream_updates_total.inc();
                }
                self.dispatch(alert, cancel).await;
            }
        }
    }

    /// Delivery is raced against cancellation so a slow notifier cannot
    /// hold up `stop`.
    async fn dispatch(&self, alert: PriceAlert, cancel: &CancellationToken) {
        let consumer_id = self.ctx.consumer_id;
        let key = CooldownKey::new(consumer_id, alert.symbol.clone(), alert.direction);

        if !self.ctx.cooldowns.try_acquire(key, alert.timestamp) {
            if let Some(m) = &self.ctx.metrics {
                m.alerts_suppressed_total.inc();
            }
            debug!(
                consumer_id,
                symbol = %alert.symbol,
                direction = ?alert.direction,
                "Alert suppressed by cooldown"
            );
            return;
        }

        info!(
            consumer_id,
            symbol = %alert.symbol,
            change_percent = alert.change_percent,
            direction = ?alert.direction,
            "Price alert"
        );
        let message = alert.message(&self.ctx.timeframe);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(consumer_id, symbol = %alert.symbol, "Alert delivery abandoned on cancellation");
                return;
            }
            _ = self.ctx.notifier.deliver(consumer_id, &message) => {}
        }
        if let Some(m) = &self.ctx.metrics {
            m.alerts_sent_total.inc();
        }
    }
}
