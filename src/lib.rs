//! Pulsewatch: real-time price-change monitoring for exchange instruments.
//!
//! A consumer starts a monitoring session with a percentage threshold and a
//! watch scope. The supervisor resolves the instrument set, splits it into
//! small chunks and runs one streaming connection per chunk. Every kline
//! update is scored against the threshold and, once past a per-direction
//! cooldown, delivered through a [`services::notifier::Notifier`].

pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

/// Identity of the end user a session runs for (a chat id on Telegram).
pub type ConsumerId = i64;
