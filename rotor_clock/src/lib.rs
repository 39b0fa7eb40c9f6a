//! Utilities for messing with time
//!
//! Types included allow mocking out clocks and other side-effect-laden time
//! operations, such as sleeping between retries, so that callers can be tested
//! without waiting on the wall clock.

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
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
#[cfg(feature = "serde")]
use serde::{Serialize, Serializer};
use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};

const ISO_8601_MILLIS: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
);

/// A point in time, rendered as an ISO-8601 UTC string with millisecond precision
///
/// ```
/// use rotor_clock::{Clock, TestClock, Timestamp};
/// use time::macros::datetime;
///
/// let clock = TestClock::new(datetime!(2024-03-01 12:30:45.678 UTC));
/// assert_eq!(
///     Timestamp::now_from(&clock).to_string(),
///     "2024-03-01T12:30:45.678Z"
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Reads the current time from `clock`
    #[inline]
    pub fn now_from<C: Clock + ?Sized>(clock: &C) -> Self {
        Self::from(clock.now())
    }

    /// The underlying UTC date and time
    #[inline]
    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }

    fn render(&self) -> Result<String, time::error::Format> {
        self.0.format(ISO_8601_MILLIS)
    }
}

impl From<OffsetDateTime> for Timestamp {
    #[inline]
    fn from(t: OffsetDateTime) -> Self {
        Self(t.to_offset(time::UtcOffset::UTC))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered = self.render().map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rendered = self.render().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&rendered)
    }
}

/// Represents a clock, which can tell the current time
pub trait Clock {
    /// Gets the current time according to this clock
    fn now(&self) -> OffsetDateTime;
}

/// The system clock
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct System;

impl Clock for System {
    #[inline]
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A test clock which maintains the current time as internal state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestClock(OffsetDateTime);

impl Default for TestClock {
    fn default() -> Self {
        Self(OffsetDateTime::UNIX_EPOCH)
    }
}

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

impl TestClock {
    /// Creates a new test clock with the specified time
    #[inline]
    pub const fn new(time: OffsetDateTime) -> Self {
        Self(time)
    }

    /// Updates the clock's current time to `val`
    pub fn set(&mut self, val: OffsetDateTime) {
        self.0 = val;
    }

    /// Moves the clock's current time forward by `inc`
    pub fn advance(&mut self, inc: Duration) {
        self.0 += inc;
    }
}

/// Something that can suspend the current task for a while
#[async_trait]
pub trait Sleep: Send + Sync {
    /// Suspends the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeps using the tokio timer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// A sleeper that returns immediately, recording each requested delay
///
/// Clones share the same record, so a test can keep one handle while
/// another is moved into the code under test.
#[derive(Clone, Debug, Default)]
pub struct TestSleep {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl TestSleep {
    /// Creates a new sleeper with no recorded delays
    pub fn new() -> Self {
        Self::default()
    }

    /// The delays requested so far, in order
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// The sum of all delays requested so far
    pub fn total(&self) -> Duration {
        self.slept().into_iter().sum()
    }
}

#[async_trait]
impl Sleep for TestSleep {
    async fn sleep(&self, duration: Duration) {
        match self.slept.lock() {
            Ok(mut slept) => slept.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn timestamp_renders_milliseconds_in_utc() {
        let ts = Timestamp::from(datetime!(2024-01-02 03:04:05.006789 +02:00));
        assert_eq!(ts.to_string(), "2024-01-02T01:04:05.006Z");
    }

    #[test]
    fn timestamp_renders_zero_subseconds() {
        let ts = Timestamp::now_from(&TestClock::new(datetime!(2030-12-31 23:59:59 UTC)));
        assert_eq!(ts.to_string(), "2030-12-31T23:59:59.000Z");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn timestamp_serializes_as_string() {
        let ts = Timestamp::from(datetime!(2024-01-02 03:04:05.5 UTC));
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-01-02T03:04:05.500Z\"");
    }

    #[test]
    fn test_clock_advances() {
        let mut clock = TestClock::new(datetime!(2024-01-01 00:00 UTC));
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), datetime!(2024-01-01 00:00:01.5 UTC));

        clock.set(datetime!(2025-06-01 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-06-01 00:00 UTC));
    }

    #[tokio::test]
    async fn test_sleep_records_without_waiting() {
        let sleeper = TestSleep::new();
        let handle = sleeper.clone();

        let started = std::time::Instant::now();
        sleeper.sleep(Duration::from_secs(30)).await;
        sleeper.sleep(Duration::from_secs(60)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            handle.slept(),
            vec![Duration::from_secs(30), Duration::from_secs(60)]
        );
        assert_eq!(handle.total(), Duration::from_secs(90));
    }
}
