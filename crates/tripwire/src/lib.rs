//! In-process circuit breaker with generation-fenced outcomes.
//!
//! A [`CircuitBreaker`] sits in front of calls to one unreliable dependency.
//! It counts successes and failures, trips open when a configurable
//! predicate says the dependency is unhealthy, fails fast while open, and
//! after a cooldown lets a limited number of probe calls through to decide
//! whether to close again.
//!
//! Every admission is tagged with a [`Generation`]. Whenever the breaker
//! changes state or resets its counts it starts a new generation, and
//! outcomes reported under an older one are discarded. A slow call that
//! straddles a transition therefore never skews the statistics of the epoch
//! that replaced it.
//!
//! # Modules
//! - [`breaker`]: the state machine and the closure-wrapping [`CircuitBreaker`]
//! - [`two_step`]: admission and outcome reporting as separate steps
//! - [`policy`]: limits, durations and strategy callbacks
//! - [`clock`]: time source abstraction with a controllable test clock
//! - `config` (feature `serde`): TOML/JSON/env loading of policies
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use tripwire::{CircuitBreaker, Policy, State};
//!
//! let breaker = CircuitBreaker::new(
//!     Policy::builder()
//!         .name("search")
//!         .timeout(Duration::from_secs(30))
//!         .trip_after_consecutive_failures(2)
//!         .build(),
//! );
//!
//! for _ in 0..3 {
//!     let _ = breaker.call(|| Err::<(), _>(std::io::Error::other("connection refused")));
//! }
//! assert_eq!(breaker.state(), State::Open);
//! assert!(breaker.call(|| Ok::<_, std::io::Error>(())).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod breaker;
pub mod clock;
#[cfg(feature = "serde")]
pub mod config;
pub mod counts;
pub mod error;
pub mod policy;
pub mod state;
pub mod two_step;
#[cfg(feature = "serde")]
pub mod utils;

pub use breaker::{CircuitBreaker, Generation};
pub use clock::{Clock, MockClock, SystemClock};
#[cfg(feature = "serde")]
pub use config::BreakerConfig;
pub use counts::Counts;
#[cfg(feature = "serde")]
pub use error::{ConfigError, ConfigResult};
pub use error::{AdmissionError, CallError, UnknownState};
pub use policy::{
    Policy, PolicyBuilder, StateObserver, SuccessClassifier, TripPredicate,
    DEFAULT_CONSECUTIVE_FAILURE_LIMIT, DEFAULT_MAX_REQUESTS, DEFAULT_TIMEOUT,
};
pub use state::State;
pub use two_step::{Permit, TwoStepCircuitBreaker};
