//! Utilities for injecting time
//!
//! Token validation and key caching both depend on "now". The types here
//! let that dependency be passed in explicitly so that expiry, not-before,
//! and cache freshness can be exercised deterministically in tests.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime},
};

/// Unix time
///
/// Unix time as represented by the number of seconds elapsed since the
/// beginning of the Unix epoch on 1970/01/01 at 00:00:00 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct UnixTime(pub u64);

impl UnixTime {
    /// The time elapsed between `earlier` and `self`
    ///
    /// Saturates to zero if `earlier` is actually later than `self`.
    #[inline]
    #[must_use]
    pub fn saturating_duration_since(self, earlier: UnixTime) -> Duration {
        Duration::from_secs(self.0.saturating_sub(earlier.0))
    }

    /// Adds a whole number of seconds, saturating at the maximum
    #[inline]
    #[must_use]
    pub fn saturating_add_secs(self, secs: u64) -> UnixTime {
        UnixTime(self.0.saturating_add(secs))
    }
}

impl From<SystemTime> for UnixTime {
    #[inline]
    fn from(t: SystemTime) -> Self {
        // Times before the epoch are clamped to the epoch itself
        let time = t
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        UnixTime(time)
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> UnixTime;
}

impl<T: Clock + ?Sized> Clock for &'_ T {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    #[inline]
    fn now(&self) -> UnixTime {
        (**self).now()
    }
}

/// The system clock as provided by `std::time::SystemTime`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime::from(SystemTime::now())
    }
}

/// A test clock which maintains the current time as internal state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TestClock(UnixTime);

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> UnixTime {
        self.0
    }
}

impl TestClock {
    /// Creates a new test clock with the specified time
    #[inline]
    pub const fn new(time: UnixTime) -> Self {
        Self(time)
    }

    /// Updates the clock's current time to `val`
    pub fn set(&mut self, val: UnixTime) {
        self.0 = val;
    }

    /// Increments the clock's current time by `inc` seconds
    pub fn inc(&mut self, inc: u64) {
        (self.0).0 += inc;
    }
}

/// A shared, manually driven clock
///
/// Clones observe the same time, so a single handle can be given to a
/// cache and a validator and then advanced from a test while both are in
/// use on other tasks.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a new shared clock starting at `time`
    #[must_use]
    pub fn new(time: UnixTime) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(time.0)),
        }
    }

    /// Updates the clock's current time to `val`
    pub fn set(&self, val: UnixTime) {
        self.secs.store(val.0, Ordering::SeqCst);
    }

    /// Advances the clock by `inc` seconds
    pub fn advance(&self, inc: u64) {
        self.secs.fetch_add(inc, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> UnixTime {
        UnixTime(self.secs.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(UnixTime(100));
        let other = clock.clone();

        clock.advance(25);
        assert_eq!(other.now(), UnixTime(125));

        other.set(UnixTime(7));
        assert_eq!(clock.now(), UnixTime(7));
    }

    #[test]
    fn duration_since_saturates() {
        let earlier = UnixTime(10);
        let later = UnixTime(70);

        assert_eq!(later.saturating_duration_since(earlier), Duration::from_secs(60));
        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn test_clock_moves_only_when_told() {
        let mut clock = TestClock::new(UnixTime(5));
        assert_eq!(clock.now(), UnixTime(5));

        clock.inc(10);
        assert_eq!(clock.now(), UnixTime(15));

        clock.set(UnixTime(1));
        assert_eq!((&clock).now(), UnixTime(1));
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(System.now() > UnixTime(0));
    }
}
