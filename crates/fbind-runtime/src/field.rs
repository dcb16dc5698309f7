#![forbid(unsafe_code)]

//! Observable, independently validatable value slots.
//!
//! A [`FieldEditor<T>`] owns one value and an optional validation rule.
//! Every write recomputes the validation outcome and then notifies
//! subscribers, all before `set` returns.
//!
//! # Invariants
//!
//! 1. [`FieldEditor::validate`] always reflects the rule applied to the
//!    current value; it is never lazily stale.
//! 2. Every write publishes exactly once, even when the new value equals the
//!    old one.
//! 3. Subscribers are notified in registration order.
//! 4. The version counter increments exactly once per write.
//! 5. A write made from inside a change handler supersedes the one being
//!    delivered: the outer delivery stops, so no subscriber sees the older
//!    value after the newer one.
//! 6. Validation transitions are announced relative to the last announced
//!    outcome, and only once the value delivery has settled.
//!
//! # Failure Modes
//!
//! - Rule panic: propagates to the caller of `set`; the value has not been
//!   stored yet.
//! - Handler panic: propagates to the caller of `set`; the value and its
//!   validation are already stored.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use fbind_core::bus::{Channel, Subscription};
use fbind_core::validation::{Rule, Validate, ValidationResult};

/// A value slot the binder (or any consumer) can read, write and observe.
///
/// Implemented by [`FieldEditor`], the async selection field and value
/// adapters, so all three can be bound to a model.
pub trait Editor<T>: Validate {
    /// Current value.
    fn value(&self) -> T;

    /// Replace the value, notifying subscribers.
    fn set_value(&self, value: T);

    /// Observe every write.
    fn watch(&self, handler: impl Fn(&T) + 'static) -> Subscription;
}

struct FieldInner<T> {
    value: RefCell<T>,
    rule: RefCell<Option<Rule<T>>>,
    validation: RefCell<ValidationResult>,
    announced: RefCell<ValidationResult>,
    version: Cell<u64>,
    changes: Channel<T>,
    validation_changes: Channel<ValidationResult>,
}

/// A shared, observable value with an optional validation rule.
///
/// Cloning a `FieldEditor` yields another handle to the same slot.
///
/// ```
/// use fbind_core::rules;
/// use fbind_runtime::field::FieldEditor;
///
/// let name = FieldEditor::with_rule(String::new(), rules::non_empty::<String>("required"));
/// assert!(!name.is_valid());
///
/// name.set("x".to_string());
/// assert!(name.is_valid());
/// ```
pub struct FieldEditor<T> {
    inner: Rc<FieldInner<T>>,
}

impl<T> Clone for FieldEditor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> FieldEditor<T> {
    /// Create a field with no validation rule.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// Create a field validated by `rule`.
    #[must_use]
    pub fn with_rule(value: T, rule: impl Fn(&T) -> ValidationResult + 'static) -> Self {
        Self::build(value, Some(Rc::new(rule)))
    }

    fn build(value: T, rule: Option<Rule<T>>) -> Self {
        let validation = rule.as_ref().map(|rule| rule(&value)).unwrap_or_default();
        Self {
            inner: Rc::new(FieldInner {
                value: RefCell::new(value),
                rule: RefCell::new(rule),
                validation: RefCell::new(validation.clone()),
                announced: RefCell::new(validation),
                version: Cell::new(0),
                changes: Channel::new(),
                validation_changes: Channel::new(),
            }),
        }
    }

    /// Current value (cloned).
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value`, revalidate, then notify subscribers.
    ///
    /// If a subscriber writes the field again, the remaining subscribers only
    /// see that newer value.
    pub fn set(&self, value: T) {
        let validation = self.evaluate(&value);
        *self.inner.value.borrow_mut() = value.clone();
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);
        self.inner.validation.replace(validation);

        let inner = &self.inner;
        inner
            .changes
            .publish_until(&value, || inner.version.get() != version);
        if inner.version.get() == version {
            self.announce_validation();
        }
    }

    /// Modify the value in place, then notify as [`set`](Self::set) does.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.get();
        f(&mut value);
        self.set(value);
    }

    /// Replace the validation rule and revalidate the current value.
    ///
    /// Does not publish a value change.
    pub fn set_rule(&self, rule: impl Fn(&T) -> ValidationResult + 'static) {
        *self.inner.rule.borrow_mut() = Some(Rc::new(rule));
        self.revalidate();
    }

    /// Remove the validation rule; the field becomes valid.
    pub fn clear_rule(&self) {
        self.inner.rule.borrow_mut().take();
        self.revalidate();
    }

    /// Last validation outcome (always current).
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.inner.validation.borrow().clone()
    }

    /// Whether the current value passes its rule.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.validation.borrow().is_valid()
    }

    /// Number of writes since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Observe every write.
    pub fn on_change(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.inner.changes.subscribe(handler)
    }

    /// Observe transitions of the validation outcome.
    pub fn on_validation_changed(
        &self,
        handler: impl Fn(&ValidationResult) + 'static,
    ) -> Subscription {
        self.inner.validation_changes.subscribe(handler)
    }

    /// Number of value subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.changes.subscriber_count()
    }

    /// Whether two handles point at the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn evaluate(&self, value: &T) -> ValidationResult {
        let rule = self.inner.rule.borrow().clone();
        rule.map(|rule| rule(value)).unwrap_or_default()
    }

    fn revalidate(&self) {
        let validation = self.with(|value| self.evaluate(value));
        self.inner.validation.replace(validation);
        self.announce_validation();
    }

    fn announce_validation(&self) {
        let current = self.inner.validation.borrow().clone();
        if *self.inner.announced.borrow() == current {
            return;
        }
        self.inner.announced.replace(current.clone());
        self.inner.validation_changes.publish(&current);
    }
}

impl<T: Clone + 'static> Validate for FieldEditor<T> {
    fn validate(&self) -> ValidationResult {
        FieldEditor::validate(self)
    }
}

impl<T: Clone + 'static> Editor<T> for FieldEditor<T> {
    fn value(&self) -> T {
        self.get()
    }

    fn set_value(&self, value: T) {
        self.set(value);
    }

    fn watch(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.on_change(handler)
    }
}

impl<T: fmt::Debug> fmt::Debug for FieldEditor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldEditor")
            .field("value", &*self.inner.value.borrow())
            .field("validation", &*self.inner.validation.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}
