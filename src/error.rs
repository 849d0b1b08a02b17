//! Error taxonomy for the monitoring engine.
//!
//! Every error here is terminal to the narrowest unit that raised it: one
//! stream task, one `start` call, or one notification.

use crate::ConsumerId;
use thiserror::Error;

/// Failure fetching the tradable instrument list.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("instrument catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("instrument catalog returned HTTP {0}")]
    Status(u16),

    #[error("instrument catalog rejected request (retCode {code}): {message}")]
    Api { code: i64, message: String },
}

/// Failure reading from the favorites store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("favorites store connection failed: {0}")]
    Connection(String),

    #[error("favorites store query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

/// Transport failure on a streaming connection.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed")]
    Closed,
}

/// Terminal outcome of a single stream monitor task.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("connect failed: {0}")]
    Connect(#[source] StreamError),

    #[error("subscribe failed: {0}")]
    Subscribe(#[source] StreamError),

    #[error("heartbeat failed: {0}")]
    Heartbeat(#[source] StreamError),

    #[error("read failed: {0}")]
    Read(#[source] StreamError),

    #[error("no message received for {0} seconds")]
    ReadTimeout(u64),

    #[error("server closed the stream")]
    ServerClosed,

    #[error("failed to encode control frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Reasons a monitoring session could not be started.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("failed to fetch instruments: {0}")]
    Catalog(#[from] CatalogError),

    #[error("instrument catalog returned no matching instruments")]
    NoInstruments,

    #[error("failed to load favorites for consumer {consumer_id}: {source}")]
    Favorites {
        consumer_id: ConsumerId,
        #[source]
        source: StoreError,
    },

    #[error("consumer {0} has no favorite instruments")]
    NoFavorites(ConsumerId),
}

impl SupervisorError {
    /// Text shown to the consumer when `start` aborts.
    pub fn user_message(&self) -> &'static str {
        match self {
            SupervisorError::Catalog(_) | SupervisorError::NoInstruments => {
                "Failed to fetch instruments"
            }
            SupervisorError::Favorites { .. } => "Failed to load your favorite instruments",
            SupervisorError::NoFavorites(_) => "You have no favorite instruments",
        }
    }
}

/// Invalid monitoring request parameters.
#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("threshold must be in (0, 100], got {0}")]
    Threshold(f64),

    #[error("timeframe must not be empty")]
    EmptyTimeframe,

    #[error("unknown watch scope: {0}")]
    Scope(String),

    #[error("unknown market category: {0}")]
    Category(String),
}

/// Invalid environment configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Failure delivering a notification. Logged, never escalated.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}
