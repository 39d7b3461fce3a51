//! Two-phase admission for work that cannot be wrapped in a closure
//!
//! [`TwoStepCircuitBreaker::allow`] performs the admission check and hands
//! back a [`Permit`]. The caller runs the guarded work however it likes
//! (on another task, after a callback fires, ...) and then completes the
//! permit with the outcome.
//!
//! ```
//! use tripwire::{Policy, TwoStepCircuitBreaker};
//!
//! let breaker = TwoStepCircuitBreaker::new(Policy::default());
//!
//! let permit = breaker.allow().expect("closed breaker admits");
//! let delivered = true; // outcome of the external work
//! permit.done(delivered);
//!
//! assert_eq!(breaker.counts().total_successes, 1);
//! ```

use crate::breaker::{CircuitBreaker, Generation};
use crate::clock::{Clock, SystemClock};
use crate::counts::Counts;
use crate::error::AdmissionError;
use crate::policy::Policy;
use crate::state::State;

/// Circuit breaker that separates admission from outcome reporting
#[derive(Debug, Clone)]
pub struct TwoStepCircuitBreaker<C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
}

impl TwoStepCircuitBreaker<SystemClock> {
    /// Create a two-step breaker driven by the system clock
    pub fn new(policy: Policy) -> Self {
        Self { breaker: CircuitBreaker::new(policy) }
    }
}

impl<C: Clock> TwoStepCircuitBreaker<C> {
    /// Create a two-step breaker driven by a custom clock
    pub fn with_clock(policy: Policy, clock: C) -> Self {
        Self { breaker: CircuitBreaker::with_clock(policy, clock) }
    }

    /// Name from the policy
    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    /// Current state, after applying any transition that is due
    pub fn state(&self) -> State {
        self.breaker.state()
    }

    /// Counts of the current generation
    pub fn counts(&self) -> Counts {
        self.breaker.counts()
    }

    /// The underlying single-step breaker
    pub fn breaker(&self) -> &CircuitBreaker<C> {
        &self.breaker
    }

    /// Check whether a new attempt may proceed
    ///
    /// # Errors
    /// Same as [`CircuitBreaker::allow`].
    pub fn allow(&self) -> Result<Permit<C>, AdmissionError> {
        let generation = self.breaker.allow()?;
        Ok(Permit { breaker: self.breaker.clone(), generation })
    }
}

impl<C: Clock> From<CircuitBreaker<C>> for TwoStepCircuitBreaker<C> {
    fn from(breaker: CircuitBreaker<C>) -> Self {
        Self { breaker }
    }
}

/// Completion handle for one admitted attempt
///
/// Completing consumes the permit, so each admission reports at most once.
/// A permit dropped without completing stays counted as an admission until
/// the breaker moves to its next generation.
#[derive(Debug)]
#[must_use = "an admitted attempt should report its outcome"]
pub struct Permit<C: Clock = SystemClock> {
    breaker: CircuitBreaker<C>,
    generation: Generation,
}

impl<C: Clock> Permit<C> {
    /// Generation the attempt was admitted under
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Report the attempt's outcome
    pub fn done(self, success: bool) {
        self.breaker.report(self.generation, success);
    }

    /// Report a successful attempt
    pub fn success(self) {
        self.done(true);
    }

    /// Report a failed attempt
    pub fn failure(self) {
        self.done(false);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::MockClock;

    /// Mirrors the single-step lifecycle through permits.
    ///
    /// Assertions:
    /// - The sixth consecutive failure opens the breaker.
    /// - `allow` rejects while open and admits one probe once half-open.
    /// - The probe's success closes the breaker.
    #[test]
    fn test_two_step_lifecycle() {
        let clock = MockClock::new();
        let breaker = TwoStepCircuitBreaker::with_clock(Policy::default(), clock.clone());

        for _ in 0..5 {
            breaker.allow().expect("closed breaker admits").failure();
        }
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.counts().consecutive_failures, 5);

        breaker.allow().expect("closed breaker admits").failure();
        assert_eq!(breaker.state(), State::Open);
        assert_eq!(breaker.allow().unwrap_err(), AdmissionError::OpenState);

        clock.advance(Duration::from_secs(60));
        let probe = breaker.allow().expect("half-open admits a probe");
        assert_eq!(breaker.allow().unwrap_err(), AdmissionError::TooManyRequests);

        probe.success();
        assert_eq!(breaker.state(), State::Closed);
        assert_eq!(breaker.counts(), Counts::default());
    }

    /// A permit from a superseded generation has no effect.
    #[test]
    fn test_stale_permit_is_ignored() {
        let clock = MockClock::new();
        let breaker = TwoStepCircuitBreaker::with_clock(
            Policy::builder().interval(Duration::from_secs(10)).build(),
            clock.clone(),
        );

        let stale = breaker.allow().expect("closed breaker admits");
        clock.advance(Duration::from_secs(10));
        assert_eq!(breaker.counts(), Counts::default());
        assert_ne!(breaker.breaker().generation(), stale.generation());

        stale.failure();
        assert_eq!(breaker.counts(), Counts::default());
    }

    #[test]
    fn test_from_breaker_shares_state() {
        let single = CircuitBreaker::new(Policy::builder().name("shared").build());
        let two_step = TwoStepCircuitBreaker::from(single.clone());

        two_step.allow().expect("closed breaker admits").success();
        assert_eq!(single.counts().total_successes, 1);
        assert_eq!(two_step.name(), "shared");
    }

    #[test]
    fn test_permit_is_send() {
        fn assert_send<T: Send + 'static>() {}
        assert_send::<Permit>();
        assert_send::<Permit<MockClock>>();
    }
}
