// ⏰ Temporal Model
// Time is explicit: every rule that counts days (notice periods, accrual
// windows, audit retention) asks an injected Clock instead of the OS.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

// ============================================================================
// CLOCK
// ============================================================================

/// Source of "now" for the engine
pub trait Clock: Send + Sync {
    /// Current instant (UTC)
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date (UTC)
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock (tests, replays)
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        FixedClock {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to midday of the given date
    pub fn on(date: NaiveDate) -> Self {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self::new(noon)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock();
        *now += Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// ============================================================================
// DAY ARITHMETIC
// ============================================================================

/// Whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Instant `days` before `now`
pub fn cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}

// ============================================================================
// TESTS
// ============================================================================
