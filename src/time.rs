//! Millisecond time primitives and the clock seam.
//!
//! The executor works entirely in whole milliseconds on a monotonic axis
//! with an arbitrary epoch. [`Clock`] is the only source of "now"; the
//! production impl reads a [`minstant::Instant`] anchored at construction,
//! and tests substitute a hand-driven clock.

use core::fmt;
use core::ops::{Add, Sub};

/// A point on the monotonic millisecond axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MonoMillis(u64);

impl MonoMillis {
    /// Creates a timestamp from raw milliseconds since the clock epoch.
    #[inline]
    #[must_use]
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond count.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// A span of whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct DurationMillis(u64);

impl DurationMillis {
    /// The zero span. As a timeout or delay this means "disabled"/"now".
    pub const ZERO: Self = Self(0);

    /// Creates a span from raw milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw millisecond count.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` for the zero span.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DurationMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl Add<DurationMillis> for MonoMillis {
    type Output = Self;

    #[inline]
    fn add(self, rhs: DurationMillis) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for MonoMillis {
    type Output = DurationMillis;

    /// Elapsed span between two timestamps.
    ///
    /// # Panics
    ///
    /// Underflows (and panics in debug builds) if `rhs` is later than `self`;
    /// the axis is monotonic, so a later "earlier" operand is a caller bug.
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        DurationMillis(self.0 - rhs.0)
    }
}

/// Source of current time for the executor.
///
/// Must be monotonic: successive calls never go backwards. Shared across the
/// control thread and every `push`/`pop` caller, hence `Send + Sync`.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the clock's epoch.
    fn now(&self) -> MonoMillis;
}

/// Production clock backed by [`minstant::Instant`], anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: minstant::Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: minstant::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> MonoMillis {
        MonoMillis::new(self.epoch.elapsed().as_millis() as u64)
    }
}
