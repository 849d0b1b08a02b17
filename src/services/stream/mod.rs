//! Exchange kline streaming: connections, wire frames and the per-chunk
//! monitor task.

pub mod connection;
pub mod messages;
pub mod monitor;

pub use connection::{StreamConnection, StreamConnector, WebSocketConnector};
pub use monitor::{MonitorContext, StreamMonitor};
