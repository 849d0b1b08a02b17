//! Outbound notification sink.

use crate::ConsumerId;
use async_trait::async_trait;
use tracing::info;

/// One-way, best-effort delivery of text to a consumer.
///
/// Implementations log their own failures; callers never see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, consumer_id: ConsumerId, text: &str);
}

/// Writes every notification to the log. Used when no chat front-end is
/// configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, consumer_id: ConsumerId, text: &str) {
        info!(consumer_id, text = %text, "Notification");
    }
}
