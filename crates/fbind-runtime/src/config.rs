#![forbid(unsafe_code)]

//! Runtime configuration for binders and selection fields.
//!
//! Both structs follow the same pattern: `Default` gives the behavior most
//! forms want, and `#[must_use]` setters adjust one knob at a time.
//!
//! ```
//! use fbind_runtime::config::{BinderConfig, SelectionConfig};
//!
//! let binder = BinderConfig::default()
//!     .validate_on_change(false)
//!     .separator("; ");
//! assert!(!binder.validate_on_change);
//!
//! let selection = SelectionConfig::default().cancel_superseded(false);
//! assert!(!selection.cancel_superseded);
//! ```

/// Configuration for a `FormBinder`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BinderConfig {
    /// Recompute aggregate validation after every fields→model sync.
    pub validate_on_change: bool,
    /// Joins individual failure messages in the composite failure.
    pub separator: String,
    /// Prefix field-level failures with `"<field>: "`.
    pub prefix_field_names: bool,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            separator: "\n".to_string(),
            prefix_field_names: true,
        }
    }
}

impl BinderConfig {
    /// Toggle validation after every field change.
    #[must_use]
    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.validate_on_change = enabled;
        self
    }

    /// Set the composite message separator.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Toggle the `"<field>: "` prefix on field failures.
    #[must_use]
    pub fn prefix_field_names(mut self, enabled: bool) -> Self {
        self.prefix_field_names = enabled;
        self
    }
}

/// Configuration for an `AsyncSelectionField`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SelectionConfig {
    /// Abort the previous in-flight fetch when a new search is issued.
    ///
    /// Correctness does not depend on this; stale results are discarded
    /// either way.
    pub cancel_superseded: bool,
    /// Reset the selected value to `None` whenever a search is issued.
    pub clear_selection_on_search: bool,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            cancel_superseded: true,
            clear_selection_on_search: false,
        }
    }
}

impl SelectionConfig {
    /// Toggle aborting superseded fetches.
    #[must_use]
    pub fn cancel_superseded(mut self, enabled: bool) -> Self {
        self.cancel_superseded = enabled;
        self
    }

    /// Toggle clearing the selection when searching.
    #[must_use]
    pub fn clear_selection_on_search(mut self, enabled: bool) -> Self {
        self.clear_selection_on_search = enabled;
        self
    }
}
