//! Clock - Time Source for the Fakes
//!
//! TigerStyle: Deterministic, controllable time for simulation.
//!
//! `SimClock` is cheap to clone; clones share one timeline so a test can
//! hand the same clock to several fakes and advance them together.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::constants::CLOCK_ADVANCE_MS_MAX;

// =============================================================================
// Clock Trait
// =============================================================================

/// Source of "now" for the fakes.
pub trait Clock: Send + Sync + Debug {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// SimClock
// =============================================================================

/// A simulated clock for deterministic testing.
///
/// TigerStyle:
/// - Time only moves forward
/// - All time operations are explicit
/// - No reliance on system time
#[derive(Debug, Clone)]
pub struct SimClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl SimClock {
    /// Create a clock starting at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        // Default for DateTime<Utc> is the Unix epoch.
        Self::at(DateTime::<Utc>::default())
    }

    /// Create a clock starting at the given time.
    ///
    /// # Example
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use sim_fakes::{Clock, SimClock};
    ///
    /// let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
    /// let clock = SimClock::at(start);
    /// assert_eq!(clock.now(), start);
    /// ```
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance time by the given duration.
    ///
    /// # Panics
    /// Panics if `by` exceeds `CLOCK_ADVANCE_MS_MAX`.
    ///
    /// # Returns
    /// The new current time.
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        // Precondition
        assert!(
            by.as_millis() <= u128::from(CLOCK_ADVANCE_MS_MAX),
            "advance({:?}) exceeds max ({}ms)",
            by,
            CLOCK_ADVANCE_MS_MAX
        );

        // Within the bound above, so the conversion cannot fail.
        let delta = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());

        let mut current = self.current.lock();
        let old_time = *current;
        *current = old_time + delta;

        // Postcondition
        assert!(*current >= old_time, "time must not go backwards");

        *current
    }

    /// Advance time by the given milliseconds.
    pub fn advance_ms(&self, ms: u64) -> DateTime<Utc> {
        self.advance(Duration::from_millis(ms))
    }

    /// Set time to an absolute value.
    ///
    /// # Panics
    /// Panics if `time` is earlier than the current time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        let mut current = self.current.lock();

        // Precondition
        assert!(
            time >= *current,
            "cannot set time backwards: {} < {}",
            time,
            *current
        );

        *current = time;
    }

    /// Get elapsed time since a given timestamp.
    ///
    /// # Panics
    /// Panics if `since` is in the future.
    #[must_use]
    pub fn elapsed_since(&self, since: DateTime<Utc>) -> Duration {
        let now = self.now();

        // Precondition
        assert!(
            since <= now,
            "elapsed_since({}) is in the future (now={})",
            since,
            now
        );

        (now - since).to_std().unwrap_or_default()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}
