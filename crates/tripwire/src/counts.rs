//! Outcome counters for the current generation

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Requests and outcomes recorded in the current generation
///
/// The breaker clears its counts whenever it moves to a new generation: on
/// every state change and, while closed, whenever the reset interval elapses.
/// At most one of the two consecutive counters is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Counts {
    /// Admissions granted in this generation
    pub requests: u32,
    /// Successful outcomes in this generation
    pub total_successes: u32,
    /// Failed outcomes in this generation
    pub total_failures: u32,
    /// Successes since the last failure
    pub consecutive_successes: u32,
    /// Failures since the last success
    pub consecutive_failures: u32,
}

impl Counts {
    pub(crate) fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub(crate) fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    pub(crate) fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fraction of reported outcomes that failed, `0.0` when nothing was reported
    ///
    /// Handy inside ratio-based trip predicates.
    pub fn failure_ratio(&self) -> f64 {
        let reported = u64::from(self.total_successes) + u64::from(self.total_failures);
        if reported == 0 {
            return 0.0;
        }
        f64::from(self.total_failures) / reported as f64
    }
}
