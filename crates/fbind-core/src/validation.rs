#![forbid(unsafe_code)]

//! Validation outcomes and composable rules.
//!
//! A validation outcome is data, never an error: [`ValidationResult`] is
//! either `Success` or `Failure(message)`. Anything that can check itself
//! implements [`Validate`], which is how a form binder composes field-level
//! and model-level checks.
//!
//! # Invariants
//!
//! 1. `Success` carries no message. [`ValidationResult::from_failures`]
//!    yields `Failure` exactly when it is given at least one message.
//! 2. [`ValidationResult::and`] keeps the first failure (left-biased).
//! 3. Rules are pure functions of their input.

use std::fmt;
use std::rc::Rc;

/// Outcome of validating a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValidationResult {
    /// The value is acceptable.
    #[default]
    Success,
    /// The value is not acceptable, with a user-facing message.
    Failure(String),
}

impl ValidationResult {
    /// Build a failure from a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// `Success` when `ok`, otherwise a failure carrying `message`.
    #[must_use]
    pub fn check(ok: bool, message: impl Into<String>) -> Self {
        if ok {
            Self::Success
        } else {
            Self::failure(message)
        }
    }

    /// Whether this is `Success`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// The failure message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure(message) => Some(message),
        }
    }

    /// Left-biased conjunction: the first failure wins.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::Success => other,
            failure @ Self::Failure(_) => failure,
        }
    }

    /// Join failure messages with `separator`; `Success` if there are none.
    #[must_use]
    pub fn from_failures<I, S>(messages: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined: Option<String> = None;
        for message in messages {
            match joined.as_mut() {
                Some(joined) => {
                    joined.push_str(separator);
                    joined.push_str(message.as_ref());
                }
                None => joined = Some(message.as_ref().to_owned()),
            }
        }
        joined.map_or(Self::Success, Self::Failure)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "valid"),
            Self::Failure(message) => write!(f, "invalid: {message}"),
        }
    }
}

/// Anything that can validate its own current state.
pub trait Validate {
    /// Validate the current state.
    fn validate(&self) -> ValidationResult;

    /// Shorthand for `self.validate().is_valid()`.
    fn is_valid(&self) -> bool {
        self.validate().is_valid()
    }
}

/// A shared validation rule over `T`.
pub type Rule<T> = Rc<dyn Fn(&T) -> ValidationResult>;

/// Ready-made rules.
///
/// Each constructor takes the failure message so callers own their wording
/// (and their translations).
pub mod rules {
    use super::ValidationResult;

    /// Fails when the trimmed text is empty.
    pub fn non_empty<S: AsRef<str>>(
        message: impl Into<String>,
    ) -> impl Fn(&S) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(!value.as_ref().trim().is_empty(), message.clone())
    }

    /// Fails when the option is `None`.
    pub fn required<T>(message: impl Into<String>) -> impl Fn(&Option<T>) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(value.is_some(), message.clone())
    }

    /// Fails when the text has fewer than `min` characters.
    pub fn min_len<S: AsRef<str>>(
        min: usize,
        message: impl Into<String>,
    ) -> impl Fn(&S) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(value.as_ref().chars().count() >= min, message.clone())
    }

    /// Fails when the text has more than `max` characters.
    pub fn max_len<S: AsRef<str>>(
        max: usize,
        message: impl Into<String>,
    ) -> impl Fn(&S) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(value.as_ref().chars().count() <= max, message.clone())
    }

    /// Fails when the value falls outside `min..=max`.
    pub fn range<N: PartialOrd>(
        min: N,
        max: N,
        message: impl Into<String>,
    ) -> impl Fn(&N) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(*value >= min && *value <= max, message.clone())
    }

    /// Fails when `accept` returns false.
    pub fn predicate<T: ?Sized>(
        accept: impl Fn(&T) -> bool,
        message: impl Into<String>,
    ) -> impl Fn(&T) -> ValidationResult {
        let message = message.into();
        move |value| ValidationResult::check(accept(value), message.clone())
    }

    /// Runs every rule in order; the first failure wins.
    pub fn all<T>(rules: Vec<super::Rule<T>>) -> impl Fn(&T) -> ValidationResult {
        move |value| {
            rules
                .iter()
                .map(|rule| rule(value))
                .find(|result| !result.is_valid())
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::rules::*;
    use super::*;

    #[test]
    fn success_is_default() {
        assert_eq!(ValidationResult::default(), ValidationResult::Success);
        assert!(ValidationResult::Success.is_valid());
        assert_eq!(ValidationResult::Success.message(), None);
    }

    #[test]
    fn and_keeps_first_failure() {
        let a = ValidationResult::failure("a");
        let b = ValidationResult::failure("b");
        assert_eq!(a.clone().and(b.clone()), a);
        assert_eq!(ValidationResult::Success.and(b.clone()), b);
        assert!(ValidationResult::Success.and(ValidationResult::Success).is_valid());
    }

    #[test]
    fn from_failures_joins() {
        let joined = ValidationResult::from_failures(["x", "y", "z"], "; ");
        assert_eq!(joined.message(), Some("x; y; z"));
        let none: [&str; 0] = [];
        assert!(ValidationResult::from_failures(none, "; ").is_valid());
        assert!(!ValidationResult::from_failures([""], "; ").is_valid());
    }

    #[test]
    fn display() {
        assert_eq!(ValidationResult::Success.to_string(), "valid");
        assert_eq!(
            ValidationResult::failure("too short").to_string(),
            "invalid: too short"
        );
    }

    #[test]
    fn non_empty_rule() {
        let rule = non_empty::<String>("required");
        assert!(!rule(&String::new()).is_valid());
        assert!(!rule(&"   ".to_string()).is_valid());
        assert!(rule(&"x".to_string()).is_valid());
    }

    #[test]
    fn required_rule() {
        let rule = required::<u8>("pick one");
        assert_eq!(rule(&None).message(), Some("pick one"));
        assert!(rule(&Some(1)).is_valid());
    }

    #[test]
    fn length_rules_count_chars() {
        let min = min_len::<&str>(3, "short");
        let max = max_len::<&str>(3, "long");
        assert!(min(&"äöü").is_valid());
        assert!(!min(&"äö").is_valid());
        assert!(max(&"äöü").is_valid());
        assert!(!max(&"äöüß").is_valid());
    }

    #[test]
    fn range_rule_is_inclusive() {
        let rule = range(18_u32, 120, "age out of range");
        assert!(rule(&18).is_valid());
        assert!(rule(&120).is_valid());
        assert!(!rule(&17).is_valid());
        assert!(!rule(&121).is_valid());
    }

    #[test]
    fn all_runs_in_order() {
        let empty: Rule<String> = Rc::new(non_empty::<String>("empty"));
        let short: Rule<String> = Rc::new(min_len::<String>(4, "short"));
        let rule = all(vec![empty, short]);
        assert_eq!(rule(&String::new()).message(), Some("empty"));
        assert_eq!(rule(&"abc".to_string()).message(), Some("short"));
        assert!(rule(&"abcd".to_string()).is_valid());
    }

    #[test]
    fn predicate_rule() {
        let rule = predicate(|s: &str| s.contains('@'), "not an email");
        assert!(rule("a@b").is_valid());
        assert!(!rule("ab").is_valid());
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn from_failures_keeps_every_message(messages in prop::collection::vec("[a-z ]{0,10}", 0..8)) {
                let result = ValidationResult::from_failures(messages.iter(), "|");
                prop_assert_eq!(result.is_valid(), messages.is_empty());
                if let Some(joined) = result.message() {
                    let parts: Vec<&str> = joined.split('|').collect();
                    prop_assert_eq!(parts, messages.iter().map(String::as_str).collect::<Vec<_>>());
                }
            }

            #[test]
            fn and_is_valid_only_when_both_are(a in any::<bool>(), b in any::<bool>()) {
                let left = ValidationResult::check(a, "left");
                let right = ValidationResult::check(b, "right");
                prop_assert_eq!(left.and(right).is_valid(), a && b);
            }
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let failure = ValidationResult::failure("bad");
        let json = serde_json::to_string(&failure).expect("serialize");
        let back: ValidationResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, failure);
    }
}
