//! Wire frames of the exchange kline stream.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Client control frame, e.g. `{"op":"subscribe","args":["kline.5.BTCUSDT"]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlRequest {
    pub op: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub args: Vec<String>,
}

impl ControlRequest {
    pub fn subscribe(topics: Vec<String>) -> Self {
        Self {
            op: "subscribe".to_string(),
            args: topics,
        }
    }

    pub fn ping() -> Self {
        Self {
            op: "ping".to_string(),
            args: Vec::new(),
        }
    }
}

pub fn kline_topic(interval: &str, symbol: &str) -> String {
    format!("kline.{}.{}", interval, symbol)
}

/// Server push frame. Acknowledgements and pongs carry neither topic nor
/// data and therefore decode to an empty message.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct KlineMessage {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub data: Vec<KlineEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KlineEntry {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub interval: String,
    #[serde(deserialize_with = "de_f64")]
    pub open: f64,
    #[serde(deserialize_with = "de_f64")]
    pub close: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub high: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub low: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub volume: f64,
    #[serde(default)]
    pub confirm: bool,
    pub timestamp: i64,
}

impl KlineMessage {
    /// Symbol encoded in the topic's third dot-separated segment.
    pub fn symbol(&self) -> Option<&str> {
        self.topic
            .split('.')
            .nth(2)
            .filter(|symbol| !symbol.is_empty())
    }

    pub fn latest(&self) -> Option<&KlineEntry> {
        self.data.last()
    }
}

/// Prices arrive as JSON strings ("105.5"); accept plain numbers too.
fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(de::Error::custom),
    }
}
