//! Time sources.
//!
//! Deadline checks, the chat visibility window and client-side debouncing
//! all read time through [`Clock`] so tests can pin or advance it.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Start at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// A clock bound to the deployment's timezone.
#[derive(Clone)]
pub struct LocalClock {
    clock: SharedClock,
    tz: Tz,
}

impl LocalClock {
    /// Bind `clock` to `tz`.
    #[must_use]
    pub fn new(clock: SharedClock, tz: Tz) -> Self {
        Self { clock, tz }
    }

    /// Wall clock in `tz`.
    #[must_use]
    pub fn system(tz: Tz) -> Self {
        Self::new(Arc::new(SystemClock), tz)
    }

    /// Current local time.
    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now().with_timezone(&self.tz)
    }

    /// Current local date.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// The configured timezone.
    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }
}

impl std::fmt::Debug for LocalClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalClock").field("tz", &self.tz).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn test_local_today_follows_timezone() {
        // 23:30 UTC on Sunday is already Monday in Stockholm (UTC+1 in winter)
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 5, 23, 30, 0).unwrap());
        let local = LocalClock::new(Arc::new(clock), chrono_tz::Europe::Stockholm);
        assert_eq!(local.today(), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    }
}
