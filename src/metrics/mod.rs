//! Prometheus metrics for the monitoring engine and its HTTP surface.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
    pub active_sessions: IntGauge,
    pub active_streams: IntGauge,
    pub stream_updates_total: IntCounter,
    pub stream_decode_errors_total: IntCounter,
    pub alerts_sent_total: IntCounter,
    pub alerts_suppressed_total: IntCounter,
    pub database_connected: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total HTTP requests handled")?;
        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently in flight")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        let active_sessions =
            IntGauge::new("active_sessions", "Consumers with a live monitoring session")?;
        let active_streams =
            IntGauge::new("active_streams", "Stream monitor tasks currently running")?;
        let stream_updates_total =
            IntCounter::new("stream_updates_total", "Kline updates scored against a threshold")?;
        let stream_decode_errors_total = IntCounter::new(
            "stream_decode_errors_total",
            "Stream frames dropped because they failed to decode",
        )?;
        let alerts_sent_total = IntCounter::new("alerts_sent_total", "Alerts delivered to consumers")?;
        let alerts_suppressed_total = IntCounter::new(
            "alerts_suppressed_total",
            "Threshold crossings suppressed by cooldown",
        )?;
        let database_connected =
            Gauge::new("database_connected", "Favorites store connection status (1 = up)")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;
        registry.register(Box::new(stream_updates_total.clone()))?;
        registry.register(Box::new(stream_decode_errors_total.clone()))?;
        registry.register(Box::new(alerts_sent_total.clone()))?;
        registry.register(Box::new(alerts_suppressed_total.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
            active_sessions,
            active_streams,
            stream_updates_total,
            stream_decode_errors_total,
            alerts_sent_total,
            alerts_suppressed_total,
            database_connected,
        })
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
