#![forbid(unsafe_code)]

//! Core building blocks for fbind.
//!
//! - [`bus`]: typed channels and the type-keyed [`ChangeBus`].
//! - [`validation`]: [`ValidationResult`], the [`Validate`] trait and
//!   ready-made rules.
//! - [`error`]: error types carried as data by the runtime.
//!
//! Everything here is single-threaded and synchronous. Field editors, the
//! form binder and async selection fields live in `fbind-runtime`.

pub mod bus;
pub mod error;
pub mod validation;

pub use bus::{ChangeBus, Channel, Subscription};
pub use error::{BindError, FetchError};
pub use validation::{Rule, Validate, ValidationResult, rules};
