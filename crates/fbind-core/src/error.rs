//! Error types shared across fbind crates.
//!
//! Expected failures (validation, fetch) are carried as data; these types
//! exist so that data has a concrete, comparable shape.
//!
//! # Failure Modes
//!
//! | Error | Raised by | Surfaced as |
//! |-------|-----------|-------------|
//! | [`FetchError`] | a selection field's fetch function | `CandidateState::Failed` |
//! | [`BindError::DuplicateField`] | registering a name twice | `Err` from `bind` / `build` |
//! | [`BindError::UnknownField`] | refreshing a name never bound | `Err` from `refresh_field` |

use std::fmt;
use std::time::Duration;

/// Failure of an asynchronous candidate fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The backing source could not be reached.
    Unavailable(String),
    /// The source answered but refused the query.
    Rejected(String),
    /// A caller-imposed deadline elapsed.
    TimedOut { after: Duration },
}

impl FetchError {
    /// Shorthand for [`FetchError::Unavailable`].
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// Shorthand for [`FetchError::Rejected`].
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "source unavailable: {reason}"),
            Self::Rejected(reason) => write!(f, "query rejected: {reason}"),
            Self::TimedOut { after } => write!(f, "fetch timed out after {}ms", after.as_millis()),
        }
    }
}

impl std::error::Error for FetchError {}

/// Wiring mistakes detected while registering fields on a binder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// A field with this name is already bound.
    DuplicateField(String),
    /// No field with this name is bound.
    UnknownField(String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateField(name) => write!(f, "field '{name}' is already bound"),
            Self::UnknownField(name) => write!(f, "no field named '{name}'"),
        }
    }
}

impl std::error::Error for BindError {}
