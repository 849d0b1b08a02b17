//! Per-(consumer, symbol, direction) alert debounce state.

use crate::models::Direction;
use crate::ConsumerId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub consumer_id: ConsumerId,
    pub symbol: String,
    pub direction: Direction,
}

impl CooldownKey {
    pub fn new(consumer_id: ConsumerId, symbol: impl Into<String>, direction: Direction) -> Self {
        Self {
            consumer_id,
            symbol: symbol.into(),
            direction,
        }
    }
}

/// Last trigger time per key, in exchange milliseconds.
///
/// Entries are never evicted; the map is bounded by the distinct
/// consumer/symbol/direction combinations that ever alerted.
#[derive(Debug)]
pub struct CooldownStore {
    period_millis: i64,
    entries: DashMap<CooldownKey, i64>,
}

impl CooldownStore {
    pub fn new(period_millis: i64) -> Self {
        Self {
            period_millis,
            entries: DashMap::new(),
        }
    }

    /// Whether an alert for `key` at `now` would pass the cooldown gate.
    pub fn should_trigger(&self, key: &CooldownKey, now: i64) -> bool {
        match self.entries.get(key) {
            Some(last) => self.elapsed(*last, now),
            None => true,
        }
    }

    pub fn record(&self, key: CooldownKey, now: i64) {
        self.entries.insert(key, now);
    }

    /// Check and record in one step under the key's shard lock, so two
    /// concurrent updates for the same key cannot both pass.
    pub fn try_acquire(&self, key: CooldownKey, now: i64) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if self.elapsed(*entry.get(), now) {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn last_trigger(&self, key: &CooldownKey) -> Option<i64> {
        self.entries.get(key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn elapsed(&self, last: i64, now: i64) -> bool {
        now.saturating_sub(last) >= self.period_millis
    }
}
