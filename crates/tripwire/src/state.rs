//! Breaker states

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::UnknownState;

/// Operational mode of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
#[repr(u8)]
pub enum State {
    /// Normal operation, every call is admitted
    #[default]
    Closed = 0,
    /// Recovery probe, a limited number of calls is admitted
    HalfOpen = 1,
    /// Calls are rejected without reaching the dependency
    Open = 2,
}

impl State {
    /// Raw discriminant of the state
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Render a raw state value, including values no variant maps to
    ///
    /// ```
    /// use tripwire::State;
    ///
    /// assert_eq!(State::describe(1), "half-open");
    /// assert_eq!(State::describe(100), "unknown state: 100");
    /// ```
    pub fn describe(raw: u8) -> String {
        match Self::try_from(raw) {
            Ok(state) => state.to_string(),
            Err(unknown) => unknown.to_string(),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half-open"),
            Self::Open => write!(f, "open"),
        }
    }
}

impl TryFrom<u8> for State {
    type Error = UnknownState;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Closed),
            1 => Ok(Self::HalfOpen),
            2 => Ok(Self::Open),
            other => Err(UnknownState(other)),
        }
    }
}

impl From<State> for u8 {
    fn from(state: State) -> Self {
        state.as_u8()
    }
}
