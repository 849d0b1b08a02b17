use crate::error::RequestError;
use crate::ConsumerId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_TIMEFRAME: &str = "15m";

/// Exchange market the instruments are traded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketCategory {
    #[default]
    Linear,
    Spot,
}

impl MarketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketCategory::Linear => "linear",
            MarketCategory::Spot => "spot",
        }
    }
}

impl fmt::Display for MarketCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketCategory {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(MarketCategory::Linear),
            "spot" => Ok(MarketCategory::Spot),
            other => Err(RequestError::Category(other.to_string())),
        }
    }
}

/// Which instruments a session watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchScope {
    /// Every active instrument quoted in the configured asset.
    #[default]
    #[serde(alias = "all")]
    AllActive,
    /// The consumer's favorites list from the external store.
    Favorites,
}

impl fmt::Display for WatchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchScope::AllActive => f.write_str("all_active"),
            WatchScope::Favorites => f.write_str("favorites"),
        }
    }
}

impl FromStr for WatchScope {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "all_active" => Ok(WatchScope::AllActive),
            "favorites" | "favourites" => Ok(WatchScope::Favorites),
            other => Err(RequestError::Scope(other.to_string())),
        }
    }
}

/// Direction of a qualifying price move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn glyph(&self) -> &'static str {
        match self {
            Direction::Up => "🟢 Long",
            Direction::Down => "🔴 Short",
        }
    }
}

/// Parameters of one consumer's monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRequest {
    pub consumer_id: ConsumerId,
    pub threshold: f64,
    pub timeframe: String,
    pub scope: WatchScope,
    pub category: MarketCategory,
}

impl MonitoringRequest {
    /// Validated constructor: threshold must lie in (0, 100] and the
    /// timeframe label must be non-empty.
    pub fn new(
        consumer_id: ConsumerId,
        threshold: f64,
        timeframe: impl Into<String>,
        scope: WatchScope,
        category: MarketCategory,
    ) -> Result<Self, RequestError> {
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(RequestError::Threshold(threshold));
        }
        let timeframe = timeframe.into().trim().to_string();
        if timeframe.is_empty() {
            return Err(RequestError::EmptyTimeframe);
        }
        Ok(Self {
            consumer_id,
            threshold,
            timeframe,
            scope,
            category,
        })
    }

    /// Kline interval used in stream topics: the leading digits of the
    /// timeframe label ("15m" -> "15"), or "1" when it has none.
    pub fn topic_interval(&self) -> &str {
        topic_interval(&self.timeframe)
    }
}

// Every leading digit is kept, not just the first: Bybit intervals are
// multi-digit ("15", "240"), so "15m" must subscribe to "15" and not "1".
pub fn topic_interval(timeframe: &str) -> &str {
    let digits = timeframe
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(timeframe.len());
    if digits == 0 {
        "1"
    } else {
        &timeframe[..digits]
    }
}
