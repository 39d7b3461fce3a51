//! Circuit breaker state machine
//!
//! # States
//! - Closed: normal operation, every call is admitted
//! - Open: the dependency is assumed down, calls fail fast
//! - Half-Open: up to `max_requests` probes test whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     should_trip(counts) after a failure
//! Closed   → Closed:   interval elapsed, counts cleared (no notification)
//! Open     → HalfOpen: timeout elapsed
//! HalfOpen → Open:     any probe fails
//! HalfOpen → Closed:   max_requests consecutive successes
//! ```
//!
//! # Generations
//! Every time the counts are cleared the breaker starts a new generation.
//! Admission hands out the current generation and outcomes are only applied
//! when they carry the generation that is still current, so a slow call
//! admitted before a trip or reset cannot corrupt the counts of the epoch
//! that replaced it.
//!
//! # Design Decisions
//! - One mutex guards state, generation, counts and expiry; every public
//!   operation is a single critical section
//! - Time-based transitions are evaluated lazily on access, never by a timer
//! - The guarded operation runs outside the lock
//! - A panicking operation is recorded as a failure and the panic resumes

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::counts::Counts;
use crate::error::{AdmissionError, CallError};
use crate::policy::Policy;
use crate::state::State;

/// Epoch token handed out by an admission check
///
/// Outcomes must be reported with the token they were admitted under; a
/// token from a superseded generation is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw generation counter
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct Core {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

struct Shared<C> {
    policy: Policy,
    clock: C,
    core: Mutex<Core>,
}

impl<C: Clock> Shared<C> {
    /// Apply any time-based transition that is due at `now`
    fn refresh(&self, core: &mut Core, now: Instant) {
        let due = core.expiry.is_some_and(|expiry| now >= expiry);
        if !due {
            return;
        }

        match core.state {
            State::Closed => {
                self.new_generation(core, now);
                debug!(
                    breaker = self.policy.name(),
                    generation = core.generation,
                    "Interval elapsed, counts reset"
                );
            }
            State::Open => self.set_state(core, State::HalfOpen, now),
            State::HalfOpen => {}
        }
    }

    fn new_generation(&self, core: &mut Core, now: Instant) {
        core.generation = core.generation.wrapping_add(1);
        core.counts.clear();
        core.expiry = match core.state {
            State::Closed => self.policy.interval().map(|interval| now + interval),
            State::Open => Some(now + self.policy.timeout()),
            State::HalfOpen => None,
        };
    }

    fn set_state(&self, core: &mut Core, to: State, now: Instant) {
        let from = core.state;
        if from == to {
            return;
        }

        core.state = to;
        self.new_generation(core, now);

        info!(
            breaker = self.policy.name(),
            %from,
            %to,
            generation = core.generation,
            "Circuit breaker state changed"
        );
        self.policy.notify(from, to);
    }

    fn allow(&self) -> Result<Generation, AdmissionError> {
        let mut core = self.core.lock();
        let now = self.clock.now();
        self.refresh(&mut core, now);

        match core.state {
            State::Open => return Err(AdmissionError::OpenState),
            State::HalfOpen if core.counts.requests >= self.policy.max_requests() => {
                return Err(AdmissionError::TooManyRequests);
            }
            _ => {}
        }

        core.counts.on_request();
        Ok(Generation(core.generation))
    }

    fn report(&self, generation: Generation, success: bool) {
        let mut core = self.core.lock();
        let now = self.clock.now();
        self.refresh(&mut core, now);

        if core.generation != generation.0 {
            trace!(
                breaker = self.policy.name(),
                reported = generation.0,
                current = core.generation,
                "Discarding outcome from a previous generation"
            );
            return;
        }

        if success {
            core.counts.on_success();
            if core.state == State::HalfOpen
                && core.counts.consecutive_successes >= self.policy.max_requests()
            {
                self.set_state(&mut core, State::Closed, now);
            }
            return;
        }

        match core.state {
            State::Closed => {
                core.counts.on_failure();
                if self.policy.should_trip(&core.counts) {
                    warn!(
                        breaker = self.policy.name(),
                        consecutive_failures = core.counts.consecutive_failures,
                        total_failures = core.counts.total_failures,
                        "Circuit breaker tripped"
                    );
                    self.set_state(&mut core, State::Open, now);
                }
            }
            State::HalfOpen => {
                warn!(breaker = self.policy.name(), "Probe failed, reopening circuit");
                self.set_state(&mut core, State::Open, now);
            }
            State::Open => {}
        }
    }

    fn snapshot(&self) -> (State, Counts, Generation) {
        let mut core = self.core.lock();
        let now = self.clock.now();
        self.refresh(&mut core, now);
        (core.state, core.counts, Generation(core.generation))
    }
}

/// Reports a failure unless disarmed, so a panic in the operation or its
/// classifier is still recorded while the panic unwinds through `execute`.
struct FailureGuard<'a, C: Clock> {
    shared: &'a Shared<C>,
    generation: Generation,
    armed: bool,
}

impl<C: Clock> FailureGuard<'_, C> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: Clock> Drop for FailureGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            warn!(breaker = self.shared.policy.name(), "Guarded call panicked");
            self.shared.report(self.generation, false);
        }
    }
}

/// Circuit breaker guarding calls to one dependency
///
/// Cloning is cheap and every clone drives the same state machine, which
/// makes it easy to share one breaker across threads and tasks.
///
/// # Examples
///
/// ```
/// use tripwire::{CallError, CircuitBreaker, Policy, State};
///
/// let breaker = CircuitBreaker::new(Policy::builder().name("profile-service").build());
///
/// let value = breaker.call(|| Ok::<_, std::io::Error>(42));
/// assert_eq!(value.ok(), Some(42));
///
/// let failed = breaker.call(|| Err::<(), _>(std::io::Error::other("unreachable")));
/// assert!(matches!(failed, Err(CallError::Operation(_))));
/// assert_eq!(breaker.state(), State::Closed);
/// ```
pub struct CircuitBreaker<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl CircuitBreaker<SystemClock> {
    /// Create a breaker driven by the system clock
    pub fn new(policy: Policy) -> Self {
        Self::with_clock(policy, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a breaker driven by a custom clock
    pub fn with_clock(policy: Policy, clock: C) -> Self {
        let now = clock.now();
        let shared = Shared {
            policy,
            clock,
            core: Mutex::new(Core {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: None,
            }),
        };
        shared.new_generation(&mut shared.core.lock(), now);

        debug!(
            breaker = shared.policy.name(),
            max_requests = shared.policy.max_requests(),
            interval = ?shared.policy.interval(),
            timeout = ?shared.policy.timeout(),
            "Circuit breaker initialized"
        );

        Self { shared: Arc::new(shared) }
    }

    /// Name from the policy
    pub fn name(&self) -> &str {
        self.shared.policy.name()
    }

    /// Resolved policy
    pub fn policy(&self) -> &Policy {
        &self.shared.policy
    }

    /// Current state, after applying any transition that is due
    pub fn state(&self) -> State {
        self.shared.snapshot().0
    }

    /// Counts of the current generation, after applying any transition that
    /// is due
    pub fn counts(&self) -> Counts {
        self.shared.snapshot().1
    }

    /// Current generation, after applying any transition that is due
    pub fn generation(&self) -> Generation {
        self.shared.snapshot().2
    }

    /// Ask whether a call may proceed
    ///
    /// On success the admission is counted and the returned token must be
    /// passed to [`report`](Self::report) once the outcome is known.
    /// Rejections leave the counts untouched.
    ///
    /// # Errors
    /// - [`AdmissionError::OpenState`] while the breaker is open
    /// - [`AdmissionError::TooManyRequests`] while half-open with every probe
    ///   slot taken
    pub fn allow(&self) -> Result<Generation, AdmissionError> {
        self.shared.allow().inspect_err(|reason| {
            debug!(breaker = self.name(), %reason, "Circuit breaker rejected call");
        })
    }

    /// Record the outcome of a call admitted under `generation`
    ///
    /// Outcomes carrying a superseded generation are discarded. Reporting
    /// the same admission twice counts it twice.
    pub fn report(&self, generation: Generation, success: bool) {
        self.shared.report(generation, success);
    }

    /// Run `operation` if the breaker admits it, classifying the outcome with
    /// the policy's `is_successful`
    ///
    /// The operation's error is returned untouched inside
    /// [`CallError::Operation`]. If the operation or the classifier panics,
    /// a failure is recorded and the panic continues unchanged.
    ///
    /// # Errors
    /// [`CallError::Rejected`] when the breaker refuses the call, otherwise
    /// [`CallError::Operation`] with the operation's own error.
    #[instrument(skip(self, operation), fields(breaker = %self.name()))]
    pub fn call<F, T, E>(&self, operation: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
    {
        let policy = &self.shared.policy;
        self.execute(operation, |error: Option<&E>| {
            policy.is_successful(error.map(|err| err as &(dyn Error + 'static)))
        })
    }

    /// Like [`call`](Self::call), but classify this call's outcome with
    /// `classify` instead of the policy's classifier
    ///
    /// `classify` receives `None` when the operation returned `Ok`. A panic
    /// in the operation is always a failure and never reaches the
    /// classifier. A panic in `classify` is recorded as a failure too.
    ///
    /// # Errors
    /// Same as [`call`](Self::call).
    #[instrument(skip(self, operation, classify), fields(breaker = %self.name()))]
    pub fn call_with<F, T, E, K>(&self, operation: F, classify: K) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
        K: FnOnce(Option<&E>) -> bool,
    {
        self.execute(operation, classify)
    }

    fn execute<F, T, E, K>(&self, operation: F, classify: K) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: Error + 'static,
        K: FnOnce(Option<&E>) -> bool,
    {
        let generation = self.allow()?;

        let mut guard = FailureGuard { shared: &self.shared, generation, armed: true };
        let result = operation();
        // a panicking classifier must still release the admission
        let success = classify(result.as_ref().err());
        guard.disarm();

        self.shared.report(generation, success);

        result.map_err(CallError::Operation)
    }
}

impl Default for CircuitBreaker<SystemClock> {
    fn default() -> Self {
        Self::new(Policy::default())
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("CircuitBreaker");
        debug.field("policy", &self.shared.policy);
        // try_lock: Debug may run from an observer that already holds the lock
        match self.shared.core.try_lock() {
            Some(core) => debug
                .field("state", &core.state)
                .field("generation", &core.generation)
                .field("counts", &core.counts),
            None => debug.field("core", &"<locked>"),
        };
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the breaker state machine
    //!
    //! Time is driven by `MockClock`, so interval and timeout boundaries are
    //! exact.

    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::clock::MockClock;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}

    fn succeed<C: Clock>(cb: &CircuitBreaker<C>) -> Result<(), CallError<Boom>> {
        cb.call(|| Ok(()))
    }

    /// Runs a failing call and checks the operation's own error came back.
    fn fail<C: Clock>(cb: &CircuitBreaker<C>) -> Result<(), AdmissionError> {
        match cb.call(|| Err::<(), _>(Boom)) {
            Err(CallError::Operation(Boom)) => Ok(()),
            Err(CallError::Rejected(reason)) => Err(reason),
            Ok(()) => panic!("failing operation reported success"),
        }
    }

    fn counts(requests: u32, ok: u32, failed: u32, ok_streak: u32, fail_streak: u32) -> Counts {
        Counts {
            requests,
            total_successes: ok,
            total_failures: failed,
            consecutive_successes: ok_streak,
            consecutive_failures: fail_streak,
        }
    }

    type Transitions = Arc<Mutex<Vec<(State, State)>>>;

    fn custom(clock: &MockClock) -> (CircuitBreaker<MockClock>, Transitions) {
        let transitions: Transitions = Arc::default();
        let sink = Arc::clone(&transitions);
        let policy = Policy::builder()
            .name("custom")
            .max_requests(3)
            .interval(Duration::from_secs(30))
            .timeout(Duration::from_secs(90))
            .should_trip(|c| {
                c.requests >= 3 && f64::from(c.total_failures) / f64::from(c.requests) >= 0.6
            })
            .on_state_change(move |from, to| sink.lock().push((from, to)))
            .build();
        (CircuitBreaker::with_clock(policy, clock.clone()), transitions)
    }

    /// Validates a fresh default breaker.
    #[test]
    fn test_new_breaker_defaults() {
        let cb = CircuitBreaker::default();
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
        assert_eq!(cb.generation().get(), 1);
        assert_eq!(cb.policy().max_requests(), 1);
        assert_eq!(cb.policy().timeout(), Duration::from_secs(60));
    }

    /// Walks the default breaker through every transition.
    ///
    /// Assertions:
    /// - Five consecutive failures keep it closed, the sixth trips it.
    /// - Open rejects until the 60s timeout has fully elapsed.
    /// - A half-open failure reopens, a half-open success closes.
    #[test]
    fn test_default_breaker_lifecycle() {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock(Policy::default(), clock.clone());

        for _ in 0..5 {
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), counts(5, 0, 5, 0, 5));

        assert!(succeed(&cb).is_ok());
        assert_eq!(cb.counts(), counts(6, 1, 5, 1, 0));

        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.counts(), counts(7, 1, 6, 0, 1));

        for _ in 0..5 {
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.counts(), Counts::default());

        assert!(matches!(succeed(&cb), Err(CallError::Rejected(AdmissionError::OpenState))));
        assert_eq!(fail(&cb), Err(AdmissionError::OpenState));
        assert_eq!(cb.counts(), Counts::default());

        clock.advance(Duration::from_secs(59));
        assert_eq!(cb.state(), State::Open);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cb.state(), State::HalfOpen);

        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.counts(), Counts::default());

        clock.advance(Duration::from_secs(60));
        assert_eq!(cb.state(), State::HalfOpen);

        assert!(succeed(&cb).is_ok());
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    /// Exercises a ratio-based predicate, the reset interval and a
    /// three-probe half-open phase.
    #[test]
    fn test_custom_breaker_lifecycle() {
        let clock = MockClock::new();
        let (cb, transitions) = custom(&clock);

        for _ in 0..5 {
            assert!(succeed(&cb).is_ok());
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), counts(10, 5, 5, 0, 1));

        clock.advance(Duration::from_secs(29));
        assert!(succeed(&cb).is_ok());
        assert_eq!(cb.counts(), counts(11, 6, 5, 1, 0));

        clock.advance(Duration::from_secs(1));
        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), counts(1, 0, 1, 0, 1));

        assert!(succeed(&cb).is_ok());
        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.state(), State::Open);
        assert_eq!(transitions.lock().last(), Some(&(State::Closed, State::Open)));

        clock.advance(Duration::from_secs(90));
        assert_eq!(cb.state(), State::HalfOpen);
        assert_eq!(transitions.lock().last(), Some(&(State::Open, State::HalfOpen)));

        assert!(succeed(&cb).is_ok());
        assert!(succeed(&cb).is_ok());
        assert_eq!(cb.state(), State::HalfOpen);
        assert_eq!(cb.counts(), counts(2, 2, 0, 2, 0));

        // third probe admitted but still in flight
        let in_flight = cb.allow().expect("third probe should be admitted");
        assert_eq!(cb.counts(), counts(3, 2, 0, 2, 0));
        assert!(matches!(
            succeed(&cb),
            Err(CallError::Rejected(AdmissionError::TooManyRequests))
        ));

        cb.report(in_flight, true);
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
        assert_eq!(transitions.lock().last(), Some(&(State::HalfOpen, State::Closed)));
        assert_eq!(transitions.lock().len(), 3);
    }

    /// Validates that a panic inside the operation counts as a failure and is
    /// re-raised with its original payload.
    #[test]
    fn test_panic_in_operation_is_recorded() {
        let cb = CircuitBreaker::default();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = cb.call(|| -> Result<(), Boom> { panic!("oops") });
        }));

        let payload = outcome.expect_err("panic should propagate");
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"oops"));
        assert_eq!(cb.counts(), counts(1, 0, 1, 0, 1));
    }

    /// Panics bypass the classifier, even one that accepts everything.
    #[test]
    fn test_panic_bypasses_classifier() {
        let cb = CircuitBreaker::new(Policy::builder().is_successful(|_| true).build());

        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = cb.call_with(|| -> Result<(), Boom> { panic!("oops") }, |_| true);
        }));

        assert_eq!(cb.counts(), counts(1, 0, 1, 0, 1));
    }

    /// Validates that a panicking classifier still reports the admission.
    ///
    /// Assertions:
    /// - While closed, the call is recorded as one failure.
    /// - While half-open with a single probe slot, the probe reopens the
    ///   breaker instead of holding the slot forever.
    #[test]
    fn test_panicking_classifier_records_failure() {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock(
            Policy::builder().trip_after_consecutive_failures(1).build(),
            clock.clone(),
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = cb.call_with(|| Err::<(), _>(Boom), |_| panic!("classifier"));
        }));
        assert!(outcome.is_err());
        assert_eq!(cb.counts(), counts(1, 0, 1, 0, 1));

        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.state(), State::Open);

        clock.set_elapsed(Duration::from_secs(60));
        assert_eq!(cb.state(), State::HalfOpen);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = cb.call_with(|| Ok::<(), Boom>(()), |_| panic!("classifier"));
        }));
        assert!(outcome.is_err());
        assert_eq!(cb.state(), State::Open);
        assert_eq!(cb.counts(), Counts::default());
    }

    /// Validates that an outcome admitted in one generation is discarded once
    /// the interval has started the next one.
    #[test]
    fn test_stale_generation_is_discarded() {
        let clock = MockClock::new();
        let (cb, _) = custom(&clock);

        clock.advance(Duration::from_secs(29));
        assert!(succeed(&cb).is_ok());

        let slow = cb.allow().expect("closed breaker admits");
        assert_eq!(cb.counts(), counts(2, 1, 0, 1, 0));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
        assert_ne!(cb.generation(), slow);

        cb.report(slow, true);
        assert_eq!(cb.counts(), Counts::default());
    }

    /// A classifier that accepts every error never trips the breaker.
    #[test]
    fn test_custom_classifier_never_trips() {
        let cb = CircuitBreaker::new(Policy::builder().is_successful(|_| true).build());

        for _ in 0..10 {
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), counts(10, 10, 0, 10, 0));
    }

    /// Switching classification mid-run applies from the next outcome on.
    ///
    /// Assertions:
    /// - Earlier successes stay counted as successes.
    /// - Six failures classified by the strict rule trip the breaker.
    #[test]
    fn test_switching_classifier_is_not_retroactive() {
        let cb = CircuitBreaker::new(Policy::builder().is_successful(|_| true).build());

        for _ in 0..5 {
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(cb.counts(), counts(5, 5, 0, 5, 0));

        let strict = |err: Option<&Boom>| err.is_none();
        for _ in 0..5 {
            let _ = cb.call_with(|| Err::<(), _>(Boom), strict);
        }
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), counts(10, 5, 5, 0, 5));

        let _ = cb.call_with(|| Err::<(), _>(Boom), strict);
        assert_eq!(cb.state(), State::Open);
    }

    /// Rejections never touch the counts.
    #[test]
    fn test_rejection_leaves_counts_untouched() {
        let clock = MockClock::new();
        let cb = CircuitBreaker::with_clock(
            Policy::builder().trip_after_consecutive_failures(0).max_requests(1).build(),
            clock.clone(),
        );

        assert_eq!(fail(&cb), Ok(()));
        assert_eq!(cb.allow(), Err(AdmissionError::OpenState));
        assert_eq!(cb.counts(), Counts::default());

        clock.advance(Duration::from_secs(60));
        let probe = cb.allow().expect("half-open admits one probe");
        assert_eq!(cb.allow(), Err(AdmissionError::TooManyRequests));
        assert_eq!(cb.counts(), counts(1, 0, 0, 0, 0));
        cb.report(probe, true);
        assert_eq!(cb.state(), State::Closed);
    }

    /// The observer fires once per committed change and never for no-ops.
    #[test]
    fn test_observer_skips_same_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let cb = CircuitBreaker::new(
            Policy::builder()
                .on_state_change(move |_, _| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .build(),
        );

        // successes while closed would "close" again: no notification
        for _ in 0..3 {
            assert!(succeed(&cb).is_ok());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        for _ in 0..6 {
            assert_eq!(fail(&cb), Ok(()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Clones drive the same state machine.
    #[test]
    fn test_clones_share_state() {
        let cb = CircuitBreaker::new(Policy::builder().trip_after_consecutive_failures(0).build());
        let other = cb.clone();

        assert_eq!(fail(&other), Ok(()));
        assert_eq!(cb.state(), State::Open);
    }

    /// Counts stay consistent under concurrent admission and reporting.
    #[test]
    fn test_concurrent_successes_are_not_lost() {
        const THREADS: usize = 16;
        const PER_THREAD: usize = 500;

        let cb = CircuitBreaker::default();
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        let generation = cb.allow().expect("closed breaker admits");
                        cb.report(generation, true);
                    }
                });
            }
        });

        let total = u32::try_from(THREADS * PER_THREAD).expect("fits in u32");
        let snapshot = cb.counts();
        assert_eq!(snapshot.requests, total);
        assert_eq!(snapshot.total_successes, total);
        assert_eq!(snapshot.consecutive_successes, total);
    }

    #[test]
    fn test_debug_renders_state() {
        let cb = CircuitBreaker::new(Policy::builder().name("dbg").build());
        let rendered = format!("{cb:?}");
        assert!(rendered.contains("Closed"));
        assert!(rendered.contains("dbg"));
    }
}
