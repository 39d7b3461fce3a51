//! Error types surfaced by the breaker
//!
//! Two kinds of failure reach a caller of [`CircuitBreaker::call`]:
//!
//! | Kind | Variant | Guarded operation ran? |
//! |------|---------|------------------------|
//! | Breaker open | [`CallError::Rejected`] / [`AdmissionError::OpenState`] | no |
//! | Probe limit reached | [`CallError::Rejected`] / [`AdmissionError::TooManyRequests`] | no |
//! | Operation failed | [`CallError::Operation`] | yes, error returned untouched |
//!
//! Rejections are local decisions and are never retried internally.
//!
//! [`CircuitBreaker::call`]: crate::CircuitBreaker::call

use thiserror::Error;

/// Reason an admission check refused a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum AdmissionError {
    /// The breaker is open; the dependency must not be called
    #[error("circuit breaker is open")]
    OpenState,

    /// The breaker is half-open and every probe slot is taken
    #[error("too many requests")]
    TooManyRequests,
}

/// Failure of a guarded call
///
/// Generic over the operation's own error type `E`, which is carried as-is
/// and never rewritten.
#[derive(Debug, Error)]
pub enum CallError<E>
where
    E: std::error::Error + 'static,
{
    /// The breaker refused the call before the operation ran
    #[error(transparent)]
    Rejected(#[from] AdmissionError),

    /// The operation ran and returned this error
    #[error(transparent)]
    Operation(E),
}

impl<E> CallError<E>
where
    E: std::error::Error + 'static,
{
    /// Whether the breaker refused the call
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// The admission error, if the call was refused
    pub const fn rejection(&self) -> Option<AdmissionError> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            Self::Operation(_) => None,
        }
    }

    /// The operation's error, if the operation ran and failed
    pub const fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }

    /// Take the operation's error, if the operation ran and failed
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

/// A raw state value that maps to no [`State`](crate::State)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown state: {0}")]
pub struct UnknownState(pub u8);

/// Failure to load a [`BreakerConfig`](crate::config::BreakerConfig)
#[cfg(feature = "serde")]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to load
        path: String,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed or has unknown fields
    #[error("invalid TOML format: {0}")]
    Toml(#[from] toml::de::Error),

    /// The JSON document is malformed or has unknown fields
    #[error("invalid JSON format: {0}")]
    Json(#[from] serde_json::Error),

    /// The file extension is neither `toml` nor `json`
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// An environment override could not be parsed
    #[error("invalid value for {key}: {message}")]
    Env {
        /// Variable name, prefix included
        key: String,
        /// Raw value and the parse failure
        message: String,
    },
}

/// Result type for configuration loading
#[cfg(feature = "serde")]
pub type ConfigResult<T> = Result<T, ConfigError>;
