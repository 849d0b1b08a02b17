//! Change detection for kline updates.

use crate::models::{Direction, PriceAlert};
use crate::services::stream::messages::KlineMessage;

/// Why a frame produced no candidate alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    EmptyPayload,
    BadTopic,
    ZeroOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Skipped(SkipReason),
    BelowThreshold { symbol: String, change_percent: f64 },
    Crossed(PriceAlert),
}

/// `(close / open - 1) * 100`, or `None` when `open` is zero or the result
/// is not finite.
pub fn change_percent(open: f64, close: f64) -> Option<f64> {
    if open == 0.0 {
        return None;
    }
    let change = (close / open - 1.0) * 100.0;
    change.is_finite().then_some(change)
}

/// Direction of a move that reaches `threshold` in either sign.
pub fn crossing(change_percent: f64, threshold: f64) -> Option<Direction> {
    if change_percent >= threshold {
        Some(Direction::Up)
    } else if change_percent <= -threshold {
        Some(Direction::Down)
    } else {
        None
    }
}

/// Decode one raw stream frame and score its latest entry.
pub fn evaluate_frame(raw: &str, threshold: f64) -> FrameOutcome {
    let message: KlineMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(_) => return FrameOutcome::Skipped(SkipReason::Malformed),
    };
    evaluate_message(&message, threshold)
}

pub fn evaluate_message(message: &KlineMessage, threshold: f64) -> FrameOutcome {
    let Some(entry) = message.latest() else {
        return FrameOutcome::Skipped(SkipReason::EmptyPayload);
    };
    let Some(symbol) = message.symbol() else {
        return FrameOutcome::Skipped(SkipReason::BadTopic);
    };
    let Some(change) = change_percent(entry.open, entry.close) else {
        return FrameOutcome::Skipped(SkipReason::ZeroOpen);
    };

    match crossing(change, threshold) {
        Some(direction) => FrameOutcome::Crossed(PriceAlert {
            symbol: symbol.to_string(),
            change_percent: change,
            close: entry.close,
            direction,
            timestamp: entry.timestamp,
        }),
        None => FrameOutcome::BelowThreshold {
            symbol: symbol.to_string(),
            change_percent: change,
        },
    }
}
