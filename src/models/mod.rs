//! Shared data models spanning the engine layers.

pub mod alert;
pub mod monitoring;

pub use alert::PriceAlert;
pub use monitoring::{Direction, MarketCategory, MonitoringRequest, WatchScope, DEFAULT_TIMEFRAME};
