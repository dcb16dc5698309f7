#![forbid(unsafe_code)]

//! Data binding for forms: editors, adapters, async selection fields and
//! the form binder.
//!
//! - [`FieldEditor`]: a shared, observable, validated value.
//! - [`ValueAdapter`]: a typed view over another editor, converting in both
//!   directions without feedback loops.
//! - [`AsyncSelectionField`]: a selection whose candidates come from an
//!   asynchronous fetch; stale results are discarded.
//! - [`FormBinder`]: keeps a domain model and named editors in step and
//!   aggregates their validation.
//!
//! # Architecture
//!
//! Every handle is an `Rc` around shared state with interior mutability;
//! nothing here is `Send`. Notifications are synchronous and delivered in
//! subscription order through [`fbind_core::bus`] channels. Back-references
//! from listeners to their owners are `Weak`, so ownership flows strictly
//! from binder to editors to listeners.
//!
//! Async work is never spawned implicitly. A search returns a
//! [`SearchTask`] future that the caller drives on a local executor of its
//! choice (or hands to [`AsyncSelectionField::spawn_search`]).

pub mod adapter;
pub mod binder;
pub mod config;
pub mod dependencies;
pub mod field;
pub mod locator;
pub mod scope;
pub mod selection;

pub use adapter::ValueAdapter;
pub use binder::{ChangeCause, FormBinder, FormBinderBuilder, ModelEvent, ValidationIssue};
pub use config::{BinderConfig, SelectionConfig};
pub use dependencies::Dependencies;
pub use field::{Editor, FieldEditor};
pub use locator::Locator;
pub use scope::SubscriptionScope;
pub use selection::{AsyncSelectionField, CandidateState, SearchTask};
