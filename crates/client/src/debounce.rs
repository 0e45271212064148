//! Per-key debounce timers.
//!
//! The table never sleeps. Callers poll [`DebounceTable::take_due`] from
//! whatever loop they run, and tests drive it with a manual clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use lunchsync_common::SharedClock;

struct Pending<V> {
    due: DateTime<Utc>,
    value: V,
}

/// Timer table with cancel-and-replace semantics per key.
pub struct DebounceTable<K, V> {
    clock: SharedClock,
    delay: TimeDelta,
    pending: HashMap<K, Pending<V>>,
}

impl<K: Eq + Hash + Clone, V> DebounceTable<K, V> {
    /// Create a table firing `delay` after the last schedule of a key.
    #[must_use]
    pub fn new(clock: SharedClock, delay: Duration) -> Self {
        Self {
            clock,
            delay: TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::zero()),
            pending: HashMap::new(),
        }
    }

    /// Arm the timer for `key`, replacing any pending value.
    ///
    /// Returns `true` if a pending value was replaced.
    pub fn schedule(&mut self, key: K, value: V) -> bool {
        let due = self.clock.now() + self.delay;
        self.pending.insert(key, Pending { due, value }).is_some()
    }

    /// Drop the pending value for `key`.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|p| p.value)
    }

    /// Take the pending value for `key` now, due or not.
    pub fn flush(&mut self, key: &K) -> Option<V> {
        self.cancel(key)
    }

    /// Remove and return every value whose timer has elapsed, earliest first.
    pub fn take_due(&mut self) -> Vec<(K, V)> {
        let now = self.clock.now();
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut fired: Vec<(DateTime<Utc>, K, V)> = due_keys
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (p.due, k, p.value)))
            .collect();
        fired.sort_by_key(|(due, _, _)| *due);
        fired.into_iter().map(|(_, k, v)| (k, v)).collect()
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Whether `key` has a pending value.
    #[must_use]
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of armed timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is armed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;
    use lunchsync_common::ManualClock;

    fn table() -> (ManualClock, DebounceTable<&'static str, u32>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap());
        let table = DebounceTable::new(Arc::new(clock.clone()), Duration::from_secs(2));
        (clock, table)
    }

    #[test]
    fn test_fires_after_delay() {
        let (clock, mut table) = table();
        table.schedule("a", 1);

        clock.advance(TimeDelta::milliseconds(1999));
        assert!(table.take_due().is_empty());

        clock.advance(TimeDelta::milliseconds(1));
        assert_eq!(table.take_due(), vec![("a", 1)]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_reschedule_replaces_value_and_restarts_timer() {
        let (clock, mut table) = table();
        assert!(!table.schedule("a", 1));

        clock.advance(TimeDelta::milliseconds(1500));
        assert!(table.schedule("a", 2));

        clock.advance(TimeDelta::milliseconds(1500));
        assert!(table.take_due().is_empty());

        clock.advance(TimeDelta::milliseconds(500));
        assert_eq!(table.take_due(), vec![("a", 2)]);
    }

    #[test]
    fn test_keys_are_independent() {
        let (clock, mut table) = table();
        table.schedule("a", 1);
        clock.advance(TimeDelta::seconds(1));
        table.schedule("b", 2);

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(table.take_due(), vec![("a", 1)]);
        assert!(table.is_pending(&"b"));

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(table.take_due(), vec![("b", 2)]);
    }

    #[test]
    fn test_cancel_and_flush() {
        let (_clock, mut table) = table();
        table.schedule("a", 1);
        table.schedule("b", 2);

        assert_eq!(table.cancel(&"a"), Some(1));
        assert_eq!(table.flush(&"b"), Some(2));
        assert_eq!(table.flush(&"b"), None);
        assert!(table.next_due().is_none());
    }
}
