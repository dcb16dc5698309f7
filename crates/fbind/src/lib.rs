#![forbid(unsafe_code)]

//! fbind: two-way data binding between domain models and form fields.
//!
//! This crate re-exports the public surface of `fbind-core` and
//! `fbind-runtime`. Most applications only need the [`prelude`].
//!
//! ```
//! use fbind::prelude::*;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Login { user: String }
//!
//! let user = FieldEditor::with_rule(String::new(), rules::non_empty::<String>("user is required"));
//! let form = FormBinder::builder(Login::default())
//!     .field("user", &user, locator!(Login, user))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(form.validate().message(), Some("user: user is required"));
//! user.set("root".to_string());
//! assert_eq!(form.model().user, "root");
//! assert!(form.is_valid());
//! ```

pub use fbind_core::{bus, error, validation};
pub use fbind_runtime::{
    adapter, binder, config, dependencies, field, locator, scope, selection,
};

pub use fbind_core::{
    BindError, ChangeBus, Channel, FetchError, Rule, Subscription, Validate, ValidationResult,
    rules,
};
pub use fbind_runtime::{
    AsyncSelectionField, BinderConfig, CandidateState, ChangeCause, Dependencies, Editor,
    FieldEditor, FormBinder, FormBinderBuilder, Locator, ModelEvent, SearchTask,
    SelectionConfig, SubscriptionScope, ValidationIssue, ValueAdapter,
};

/// Everything needed to declare and bind a form.
pub mod prelude {
    pub use fbind_core::{FetchError, Subscription, Validate, ValidationResult, rules};
    pub use fbind_runtime::locator;
    pub use fbind_runtime::{
        AsyncSelectionField, BinderConfig, CandidateState, Dependencies, Editor, FieldEditor,
        FormBinder, Locator, SelectionConfig, ValueAdapter,
    };
}
