//! Breaker policy: limits, durations and strategy callbacks
//!
//! A [`Policy`] is resolved once, when the builder runs, and never changes
//! afterwards. Every field has a default, and out-of-range inputs are
//! normalized instead of rejected:
//!
//! | Setting | Default | Normalization |
//! |---------|---------|---------------|
//! | `max_requests` | 1 | 0 becomes 1 |
//! | `interval` | disabled | zero disables the periodic reset |
//! | `timeout` | 60s | zero becomes 60s |
//! | `should_trip` | more than 5 consecutive failures | |
//! | `is_successful` | success iff no error | |
//! | `on_state_change` | none | |
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use tripwire::Policy;
//!
//! let policy = Policy::builder()
//!     .name("billing-api")
//!     .max_requests(3)
//!     .interval(Duration::from_secs(30))
//!     .timeout(Duration::from_secs(90))
//!     .should_trip(|counts| counts.requests >= 3 && counts.failure_ratio() >= 0.6)
//!     .build();
//!
//! assert_eq!(policy.max_requests(), 3);
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::counts::Counts;
use crate::state::State;

/// Open-state cooldown used when none (or zero) is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Half-open admission limit used when none (or zero) is configured
pub const DEFAULT_MAX_REQUESTS: u32 = 1;

/// The default predicate trips once consecutive failures exceed this value
pub const DEFAULT_CONSECUTIVE_FAILURE_LIMIT: u32 = 5;

/// Decides, after a failure while closed, whether the breaker trips open
pub type TripPredicate = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Classifies an operation outcome; `None` means the operation returned `Ok`
pub type SuccessClassifier = Arc<dyn Fn(Option<&(dyn Error + 'static)>) -> bool + Send + Sync>;

/// Observer invoked with `(from, to)` on every committed state change
pub type StateObserver = Arc<dyn Fn(State, State) + Send + Sync>;

/// Resolved, immutable breaker configuration
#[derive(Clone)]
pub struct Policy {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    should_trip: TripPredicate,
    is_successful: SuccessClassifier,
    on_state_change: Option<StateObserver>,
}

impl Policy {
    /// Start building a policy from the defaults
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    /// Name used to tag tracing events
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Probe admissions allowed while half-open, and successes needed to close
    pub const fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Closed-state count reset period; `None` when disabled
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval.is_zero() {
            None
        } else {
            Some(self.interval)
        }
    }

    /// Open-state cooldown before probing resumes
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a state-change observer is installed
    pub const fn has_observer(&self) -> bool {
        self.on_state_change.is_some()
    }

    pub(crate) fn should_trip(&self, counts: &Counts) -> bool {
        (self.should_trip)(counts)
    }

    pub(crate) fn is_successful(&self, error: Option<&(dyn Error + 'static)>) -> bool {
        (self.is_successful)(error)
    }

    pub(crate) fn notify(&self, from: State, to: State) {
        if let Some(observer) = &self.on_state_change {
            observer(from, to);
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        PolicyBuilder::new().build()
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("has_observer", &self.has_observer())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Policy`]
///
/// Unset fields fall back to the defaults listed in the module docs.
#[derive(Default)]
pub struct PolicyBuilder {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    should_trip: Option<TripPredicate>,
    is_successful: Option<SuccessClassifier>,
    on_state_change: Option<StateObserver>,
}

impl PolicyBuilder {
    /// Empty builder; every field falls back to its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used to tag tracing events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Probe admissions allowed while half-open; 0 means 1
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Closed-state count reset period; zero disables it
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Open-state cooldown before probing; zero means 60s
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Predicate consulted after each closed-state failure
    pub fn should_trip<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.should_trip = Some(Arc::new(predicate));
        self
    }

    /// Trip once consecutive failures exceed `limit`
    ///
    /// The default predicate is `trip_after_consecutive_failures(5)`.
    pub fn trip_after_consecutive_failures(self, limit: u32) -> Self {
        self.should_trip(move |counts| counts.consecutive_failures > limit)
    }

    /// Classifier deciding whether an outcome counts as a success
    pub fn is_successful<F>(mut self, classifier: F) -> Self
    where
        F: Fn(Option<&(dyn Error + 'static)>) -> bool + Send + Sync + 'static,
    {
        self.is_successful = Some(Arc::new(classifier));
        self
    }

    /// Install an observer for committed state changes
    ///
    /// The observer runs synchronously while the breaker's lock is held. It
    /// must return quickly and must not call back into the same breaker.
    pub fn on_state_change<F>(mut self, observer: F) -> Self
    where
        F: Fn(State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(observer));
        self
    }

    /// Resolve defaults and normalize values into a [`Policy`]
    pub fn build(self) -> Policy {
        let max_requests =
            if self.max_requests == 0 { DEFAULT_MAX_REQUESTS } else { self.max_requests };
        let timeout = if self.timeout.is_zero() { DEFAULT_TIMEOUT } else { self.timeout };

        let should_trip: TripPredicate = match self.should_trip {
            Some(predicate) => predicate,
            None => Arc::new(|counts: &Counts| {
                counts.consecutive_failures > DEFAULT_CONSECUTIVE_FAILURE_LIMIT
            }),
        };
        let is_successful: SuccessClassifier = match self.is_successful {
            Some(classifier) => classifier,
            None => Arc::new(|error: Option<&(dyn Error + 'static)>| error.is_none()),
        };

        Policy {
            name: self.name,
            max_requests,
            interval: self.interval,
            timeout,
            should_trip,
            is_successful,
            on_state_change: self.on_state_change,
        }
    }
}

impl fmt::Debug for PolicyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyBuilder")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
