//! Content versions and the watermark sentinel.
//!
//! Every mutation of a [`Group`](crate::Group) ticks a single monotonic clock and
//! stamps the touched tables with the new value. A view remembers the version
//! it last synced against; comparing that watermark with the current version of
//! whatever the view depends on is how staleness is detected.

use serde::{Deserialize, Serialize};

/// A content version of a table.
pub type Version = u64;

/// Outside version reported when a view depends, directly or through a
/// restricting view, on an object or list that no longer exists. The clock
/// never issues it, so a watermark taken before the loss never matches it.
pub const DELETED_DEPENDENCY: Version = u64::MAX;

/// A monotonic version clock.
///
/// The clock stops one short of [`DELETED_DEPENDENCY`] so that a real version
/// can never be mistaken for the sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionClock {
    counter: Version,
}

impl VersionClock {
    /// Create a new clock starting at version 0.
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Create a clock at a specific version.
    pub fn with_counter(counter: Version) -> Self {
        Self {
            counter: counter.min(DELETED_DEPENDENCY - 1),
        }
    }

    /// The most recently issued version.
    pub fn current(&self) -> Version {
        self.counter
    }

    /// Advance the clock and return the new version.
    pub fn tick(&mut self) -> Version {
        if self.counter < DELETED_DEPENDENCY - 1 {
            self.counter += 1;
        }
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clock_starts_at_zero() {
        let clock = VersionClock::new();
        assert_eq!(clock.current(), 0);
    }

    #[test]
    fn tick_increments_counter() {
        let mut clock = VersionClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn clock_never_reaches_sentinel() {
        let mut clock = VersionClock::with_counter(u64::MAX);
        assert_eq!(clock.current(), DELETED_DEPENDENCY - 1);
        clock.tick();
        assert_ne!(clock.current(), DELETED_DEPENDENCY);
    }

    #[test]
    fn serialization_roundtrip() {
        let clock = VersionClock::with_counter(42);
        let json = serde_json::to_string(&clock).unwrap();
        let parsed: VersionClock = serde_json::from_str(&json).unwrap();
        assert_eq!(clock, parsed);
    }
}
