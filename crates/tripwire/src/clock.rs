//! Time source for lazy transitions
//!
//! The breaker never runs a timer. Every operation reads the clock once and
//! compares it with the current expiry, so swapping the clock is all it takes
//! to drive interval and timeout behavior deterministically in tests.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use tripwire::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time source consulted by the breaker on every access
pub trait Clock: Send + Sync + 'static {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Real monotonic clock, the default for every breaker
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same elapsed time, so a test can hand one clone to the
/// breaker and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock anchored at the current instant
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a mock clock anchored at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self { start, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Move time forward by `duration`
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Move time forward by `millis` milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Jump to an absolute offset from the anchor
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Time simulated since the anchor
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}
