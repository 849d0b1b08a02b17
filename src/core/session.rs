//! A consumer's running set of chunk monitors.
//!
//! The session owns a parent cancellation token; each chunk task runs under
//! a child token and its own error boundary. Cancelling the session stops
//! every chunk, and [`Session::join`] waits for all of them to exit.

use crate::error::MonitorError;
use crate::models::{MarketCategory, MonitoringRequest, WatchScope};
use crate::services::stream::{MonitorContext, StreamMonitor};
use crate::ConsumerId;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// How one chunk task ended.
#[derive(Debug)]
pub enum ChunkOutcome {
    Cancelled,
    Failed(MonitorError),
    Panicked(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionSummary {
    pub consumer_id: ConsumerId,
    pub streams: usize,
    /// Chunk tasks still running; lower than `streams` once a chunk failed.
    pub live_streams: usize,
    pub instruments: usize,
    pub threshold: f64,
    pub timeframe: String,
    pub scope: WatchScope,
    pub category: MarketCategory,
    pub started_at: DateTime<Utc>,
}

pub struct Session {
    request: MonitoringRequest,
    instruments: usize,
    started_at: DateTime<Utc>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<ChunkOutcome>>,
}

impl Session {
    /// Spawn one monitor task per chunk.
    pub fn spawn(
        request: MonitoringRequest,
        chunks: Vec<Vec<String>>,
        ctx: Arc<MonitorContext>,
    ) -> Self {
        let token = CancellationToken::new();
        let instruments = chunks.iter().map(Vec::len).sum();
        let mut tasks = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            tasks.push(tokio::spawn(run_chunk(
                ctx.clone(),
                chunk,
                token.child_token(),
            )));
        }

        Self {
            request,
            instruments,
            started_at: Utc::now(),
            token,
            tasks,
        }
    }

    pub fn streams(&self) -> usize {
        self.tasks.len()
    }

    /// Chunk tasks that have not exited yet.
    pub fn live_streams(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    /// Signal every chunk to stop. Does not wait.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for every chunk task to exit.
    pub async fn join(self) -> Vec<ChunkOutcome> {
        self.token.cancel();
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                // run_chunk catches panics itself; this only happens if the
                // runtime is shutting down.
                Err(e) => outcomes.push(ChunkOutcome::Panicked(e.to_string())),
            }
        }
        outcomes
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            consumer_id: self.request.consumer_id,
            streams: self.tasks.len(),
            live_streams: self.live_streams(),
            instruments: self.instruments,
            threshold: self.request.threshold,
            timeframe: self.request.timeframe.clone(),
            scope: self.request.scope,
            category: self.request.category,
            started_at: self.started_at,
        }
    }
}

/// Error boundary around one monitor: converts failures and panics into a
/// [`ChunkOutcome`] and tells the consumer about them.
async fn run_chunk(
    ctx: Arc<MonitorContext>,
    symbols: Vec<String>,
    token: CancellationToken,
) -> ChunkOutcome {
    if let Some(m) = &ctx.metrics {
        m.active_streams.inc();
    }

    let label = symbols.join(", ");
    let monitor = StreamMonitor::new(ctx.clone(), symbols);
    let result = AssertUnwindSafe(monitor.run(token.clone()))
        .catch_unwind()
        .await;

    if let Some(m) = &ctx.metrics {
        m.active_streams.dec();
    }

    let outcome = match result {
        Ok(Ok(())) => ChunkOutcome::Cancelled,
        Ok(Err(e)) => ChunkOutcome::Failed(e),
        Err(payload) => ChunkOutcome::Panicked(panic_message(payload)),
    };

    let consumer_id = ctx.consumer_id;
    match &outcome {
        ChunkOutcome::Cancelled => {
            debug!(consumer_id, symbols = %label, "Chunk stopped");
        }
        ChunkOutcome::Failed(MonitorError::Connect(e)) => {
            warn!(consumer_id, symbols = %label, error = %e, "Chunk failed to connect");
            notify(
                &ctx,
                &token,
                &format!("❌ Failed to connect to the market stream ({})", label),
            )
            .await;
        }
        ChunkOutcome::Failed(e) => {
            warn!(consumer_id, symbols = %label, error = %e, "Chunk stream ended");
            notify(
                &ctx,
                &token,
                &format!(
                    "⚠️ Market stream for {} ended: {}. Restart monitoring to resume.",
                    label, e
                ),
            )
            .await;
        }
        ChunkOutcome::Panicked(message) => {
            error!(consumer_id, symbols = %label, panic = %message, "Chunk monitor panicked");
            notify(
                &ctx,
                &token,
                "⚠️ Monitoring crashed unexpectedly. Restart monitoring once the issue is resolved.",
            )
            .await;
        }
    }

    outcome
}

/// Failure notice that gives up once the session is stopped.
async fn notify(ctx: &MonitorContext, token: &CancellationToken, text: &str) {
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(consumer_id = ctx.consumer_id, "Failure notice abandoned on cancellation");
        }
        _ = ctx.notifier.deliver(ctx.consumer_id, text) => {}
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
