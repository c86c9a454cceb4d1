use chrono::{DateTime, Utc};
use core::fmt::Debug;

/// Source of wall-clock time.
///
/// Remote quota reset times are reported as epoch seconds, so comparing against them
/// needs the wall clock rather than a monotonic one. Tests substitute a [`FixedClock`].
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
