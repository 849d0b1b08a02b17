use super::monitoring::Direction;
use serde::{Deserialize, Serialize};

/// A threshold crossing for one instrument, before the cooldown gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub symbol: String,
    pub change_percent: f64,
    pub close: f64,
    pub direction: Direction,
    /// Exchange-reported update time, milliseconds since epoch.
    pub timestamp: i64,
}

impl PriceAlert {
    pub fn message(&self, timeframe: &str) -> String {
        format!(
            "Ticker: {}\nPrice change: {:.2}%\nLast price: {:.2}$\nTimeframe: {}\nDirection: {}",
            self.symbol,
            self.change_percent,
            self.close,
            timeframe,
            self.direction.glyph()
        )
    }
}
