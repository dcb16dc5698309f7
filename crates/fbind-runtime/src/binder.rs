#![forbid(unsafe_code)]

//! Two-way synchronization between a domain model and named field editors.
//!
//! A [`FormBinder<M>`] owns a model value and a list of `(name, editor,
//! locator)` registrations. Two directions are kept in step:
//!
//! - **model → fields**: [`FormBinder::replace_model`] pushes every
//!   locator's value into its editor. While pushing, the write-back path is
//!   suppressed, so the model being replaced is never modified by its own
//!   fan-out.
//! - **fields → model**: every editor carries one standing subscription,
//!   installed at bind time, that writes the locator back into the model,
//!   revalidates, and republishes the whole model.
//!
//! # Architecture
//!
//! The binder is a handle around `Rc<BinderInner<M>>`. Field listeners hold
//! a `Weak` back-reference, so the binder owns its editors but no editor
//! owns the binder; dropping the last binder handle drops every listener.
//!
//! Model and validation announcements go through a [`ChangeBus`], one
//! channel per event type ([`ModelEvent<M>`], [`ValidationResult`]).
//!
//! # Invariants
//!
//! 1. After any operation returns, every editor's value equals the model's
//!    value at its locator.
//! 2. One editor write yields exactly one [`ModelEvent`], delivered after the
//!    model is updated and validation is recomputed.
//! 3. Validation failure never blocks propagation; there is no rollback.
//! 4. Field failures precede custom-rule failures in the composite message,
//!    each group in registration order.
//!
//! # Failure Modes
//!
//! - Locator or rule panic: propagates; these are wiring defects.
//! - Re-entrant model mutation from inside a custom rule: panics on the
//!   `RefCell` borrow; rules must be pure.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::bus::{ChangeBus, Subscription};
use fbind_core::error::BindError;
use fbind_core::validation::{Validate, ValidationResult};
use tracing::{debug_span, trace};

use crate::config::BinderConfig;
use crate::dependencies::Dependencies;
use crate::field::Editor;
use crate::locator::Locator;
use crate::scope::SubscriptionScope;

type CustomRule<M> = Rc<dyn Fn(&M) -> ValidationResult>;

/// Why the model changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeCause {
    /// The whole model was replaced.
    Replaced,
    /// The named field was edited.
    Field(String),
}

/// Announcement of a settled model change.
#[derive(Debug, Clone)]
pub struct ModelEvent<M> {
    /// The model after the change.
    pub model: M,
    /// What triggered it.
    pub cause: ChangeCause,
}

/// One failed check, attributed to its field when it came from one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// The field name, or `None` for a custom model rule.
    pub field: Option<String>,
    /// The failure message.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

struct BoundField<M> {
    name: String,
    push: Box<dyn Fn(&M)>,
    validate: Box<dyn Fn() -> ValidationResult>,
    handle: Rc<dyn Any>,
}

struct BinderInner<M> {
    model: RefCell<M>,
    fields: RefCell<Vec<Rc<BoundField<M>>>>,
    rules: RefCell<Vec<CustomRule<M>>>,
    bus: ChangeBus,
    listeners: RefCell<SubscriptionScope>,
    pushing: Cell<bool>,
    validation: RefCell<ValidationResult>,
    config: BinderConfig,
    dependencies: Dependencies,
}

impl<M: Clone + 'static> BinderInner<M> {
    /// Run `f` with the fields → model path suppressed.
    fn push_down(&self, f: impl FnOnce()) {
        let previous = self.pushing.replace(true);
        f();
        self.pushing.set(previous);
    }

    fn issues(&self) -> Vec<ValidationIssue> {
        let fields: Vec<Rc<BoundField<M>>> = self.fields.borrow().clone();
        let mut issues: Vec<ValidationIssue> = fields
            .iter()
            .filter_map(|field| match (field.validate)() {
                ValidationResult::Success => None,
                ValidationResult::Failure(message) => Some(ValidationIssue {
                    field: Some(field.name.clone()),
                    message,
                }),
            })
            .collect();

        let rules: Vec<CustomRule<M>> = self.rules.borrow().clone();
        let model = self.model.borrow();
        issues.extend(rules.iter().filter_map(|rule| match rule(&model) {
            ValidationResult::Success => None,
            ValidationResult::Failure(message) => Some(ValidationIssue {
                field: None,
                message,
            }),
        }));
        issues
    }

    fn compose(&self, issues: &[ValidationIssue]) -> ValidationResult {
        let messages = issues.iter().map(|issue| {
            if self.config.prefix_field_names {
                issue.to_string()
            } else {
                issue.message.clone()
            }
        });
        ValidationResult::from_failures(messages, &self.config.separator)
    }

    fn revalidate(&self) -> ValidationResult {
        let _span = debug_span!("form_validate").entered();
        let result = self.compose(&self.issues());
        let previous = self.validation.replace(result.clone());
        if previous != result {
            trace!(valid = result.is_valid(), "form validation changed");
            self.bus.publish(&result);
        }
        result
    }

    fn announce(&self, cause: ChangeCause) {
        let model = self.model.borrow().clone();
        self.bus.publish(&ModelEvent { model, cause });
    }

    /// fields → model for one editor write.
    fn sync_field(&self, name: &str, write: impl FnOnce(&mut M)) {
        write(&mut self.model.borrow_mut());
        trace!(field = name, "field synchronized into model");
        if self.config.validate_on_change {
            self.revalidate();
        }
        self.announce(ChangeCause::Field(name.to_owned()));
    }
}

/// Keeps a domain model and a set of named editors in step.
///
/// ```
/// use fbind_core::rules;
/// use fbind_runtime::binder::FormBinder;
/// use fbind_runtime::field::FieldEditor;
/// use fbind_runtime::locator;
///
/// #[derive(Clone, Debug, Default, PartialEq)]
/// struct Signup { email: String }
///
/// let email = FieldEditor::with_rule(String::new(), rules::non_empty::<String>("required"));
/// let form = FormBinder::new(Signup::default());
/// form.bind("email", &email, locator!(Signup, email)).unwrap();
///
/// assert!(!form.is_valid());
/// email.set("ada@example.com".to_string());
/// assert_eq!(form.model().email, "ada@example.com");
/// assert!(form.is_valid());
/// ```
pub struct FormBinder<M> {
    inner: Rc<BinderInner<M>>,
}

impl<M> Clone for FormBinder<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M: Clone + 'static> FormBinder<M> {
    /// A binder over `model` with default configuration and no fields.
    #[must_use]
    pub fn new(model: M) -> Self {
        Self::with_parts(model, BinderConfig::default(), Dependencies::new())
    }

    /// Start a builder over `model`.
    #[must_use]
    pub fn builder(model: M) -> FormBinderBuilder<M> {
        FormBinderBuilder::new(model)
    }

    fn with_parts(model: M, config: BinderConfig, dependencies: Dependencies) -> Self {
        Self {
            inner: Rc::new(BinderInner {
                model: RefCell::new(model),
                fields: RefCell::new(Vec::new()),
                rules: RefCell::new(Vec::new()),
                bus: ChangeBus::new(),
                listeners: RefCell::new(SubscriptionScope::new()),
                pushing: Cell::new(false),
                validation: RefCell::new(ValidationResult::Success),
                config,
                dependencies,
            }),
        }
    }

    /// Register `editor` under `name`, addressing `locator` in the model.
    ///
    /// The editor immediately takes the model's current value at the
    /// locator; from then on every write to it is synchronized back.
    pub fn bind<T, E>(
        &self,
        name: impl Into<String>,
        editor: &E,
        locator: Locator<M, T>,
    ) -> Result<(), BindError>
    where
        T: Clone + 'static,
        E: Editor<T> + Clone + 'static,
    {
        let name = name.into();
        let inner = &self.inner;
        if inner.fields.borrow().iter().any(|field| field.name == name) {
            return Err(BindError::DuplicateField(name));
        }

        let initial = locator.get(&inner.model.borrow());
        inner.push_down(|| editor.set_value(initial));

        // fields → model
        let weak: Weak<BinderInner<M>> = Rc::downgrade(inner);
        let field_name = name.clone();
        let write_back = locator.clone();
        let subscription: Subscription = editor.watch(move |value: &T| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.pushing.get() {
                return;
            }
            inner.sync_field(&field_name, |model| write_back.set(model, value.clone()));
        });
        inner.listeners.borrow_mut().hold(subscription);

        // model → field
        let push_editor = editor.clone();
        let validate_editor = editor.clone();
        inner.fields.borrow_mut().push(Rc::new(BoundField {
            name,
            push: Box::new(move |model| push_editor.set_value(locator.get(model))),
            validate: Box::new(move || validate_editor.validate()),
            handle: Rc::new(editor.clone()),
        }));

        if inner.config.validate_on_change {
            inner.revalidate();
        }
        Ok(())
    }

    /// Replace the model and push every slot into its editor.
    pub fn replace_model(&self, model: M) {
        let inner = &self.inner;
        let fields: Vec<Rc<BoundField<M>>> = inner.fields.borrow().clone();
        inner.push_down(|| {
            for field in &fields {
                (field.push)(&model);
            }
        });
        *inner.model.borrow_mut() = model;
        trace!(fields = fields.len(), "model replaced");

        inner.revalidate();
        inner.announce(ChangeCause::Replaced);
    }

    /// Edit a copy of the model and [`replace_model`](Self::replace_model)
    /// with it.
    pub fn update_model(&self, f: impl FnOnce(&mut M)) {
        let mut model = self.model();
        f(&mut model);
        self.replace_model(model);
    }

    /// Re-push one slot from the model into its editor.
    pub fn refresh_field(&self, name: &str) -> Result<(), BindError> {
        let field = self
            .inner
            .fields
            .borrow()
            .iter()
            .find(|field| field.name == name)
            .cloned()
            .ok_or_else(|| BindError::UnknownField(name.to_owned()))?;
        let model = self.model();
        self.inner.push_down(|| (field.push)(&model));
        Ok(())
    }

    /// Append a model-level rule. Rules run in append order, after field
    /// rules.
    pub fn add_custom_validation_rule(&self, rule: impl Fn(&M) -> ValidationResult + 'static) {
        self.inner.rules.borrow_mut().push(Rc::new(rule));
        if self.inner.config.validate_on_change {
            self.inner.revalidate();
        }
    }

    /// Remove every model-level rule.
    pub fn clear_custom_validation_rules(&self) {
        self.inner.rules.borrow_mut().clear();
        if self.inner.config.validate_on_change {
            self.inner.revalidate();
        }
    }

    /// Validate every field, then every custom rule, into one result.
    pub fn validate(&self) -> ValidationResult {
        self.inner.revalidate()
    }

    /// Whether [`validate`](Self::validate) would currently succeed.
    ///
    /// A pure query: it neither records the outcome in
    /// [`last_validation`](Self::last_validation) nor notifies
    /// validation subscribers.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.compose(&self.inner.issues()).is_valid()
    }

    /// Every current failure, attributed to its field where applicable.
    #[must_use]
    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.inner.issues()
    }

    /// The outcome of the most recent validation pass.
    #[must_use]
    pub fn last_validation(&self) -> ValidationResult {
        self.inner.validation.borrow().clone()
    }

    /// A copy of the current model.
    #[must_use]
    pub fn model(&self) -> M {
        self.inner.model.borrow().clone()
    }

    /// Borrow the current model.
    pub fn with_model<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.inner.model.borrow())
    }

    /// Observe the model after each settled change.
    pub fn on_model_changed(&self, handler: impl Fn(&M) + 'static) -> Subscription {
        self.inner
            .bus
            .subscribe(move |event: &ModelEvent<M>| handler(&event.model))
    }

    /// Observe settled changes together with their cause.
    pub fn on_model_event(&self, handler: impl Fn(&ModelEvent<M>) + 'static) -> Subscription {
        self.inner.bus.subscribe(handler)
    }

    /// Observe transitions of the aggregate validation outcome.
    pub fn on_validation_changed(
        &self,
        handler: impl Fn(&ValidationResult) + 'static,
    ) -> Subscription {
        self.inner.bus.subscribe(handler)
    }

    /// The editor registered under `name`, if it has type `E`.
    #[must_use]
    pub fn editor<E: Clone + 'static>(&self, name: &str) -> Option<E> {
        self.inner
            .fields
            .borrow()
            .iter()
            .find(|field| field.name == name)
            .and_then(|field| field.handle.downcast_ref::<E>().cloned())
    }

    /// Registered field names, in registration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        self.inner
            .fields
            .borrow()
            .iter()
            .map(|field| field.name.clone())
            .collect()
    }

    /// Number of registered fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    /// The collaborator bag supplied at construction.
    #[must_use]
    pub fn dependencies(&self) -> &Dependencies {
        &self.inner.dependencies
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.inner.config
    }
}

impl<M: Clone + 'static> Validate for FormBinder<M> {
    fn validate(&self) -> ValidationResult {
        FormBinder::validate(self)
    }
}

impl<M: fmt::Debug> fmt::Debug for FormBinder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .inner
            .fields
            .borrow()
            .iter()
            .map(|field| field.name.clone())
            .collect();
        f.debug_struct("FormBinder")
            .field("model", &*self.inner.model.borrow())
            .field("fields", &names)
            .field("rules", &self.inner.rules.borrow().len())
            .field("validation", &*self.inner.validation.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

type Registration<M> = Box<dyn FnOnce(&FormBinder<M>) -> Result<(), BindError>>;

/// Declarative construction of a [`FormBinder`].
///
/// Fields are bound in the order they were added; the first wiring error
/// aborts [`build`](Self::build).
#[must_use = "a builder does nothing until build() is called"]
pub struct FormBinderBuilder<M> {
    model: M,
    config: BinderConfig,
    dependencies: Dependencies,
    registrations: Vec<Registration<M>>,
    rules: Vec<CustomRule<M>>,
}

impl<M: Clone + 'static> FormBinderBuilder<M> {
    fn new(model: M) -> Self {
        Self {
            model,
            config: BinderConfig::default(),
            dependencies: Dependencies::new(),
            registrations: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// Use `config` instead of the default.
    pub fn config(mut self, config: BinderConfig) -> Self {
        self.config = config;
        self
    }

    /// Supply collaborators for field factories.
    pub fn dependencies(mut self, dependencies: Dependencies) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Bind an existing editor.
    pub fn field<T, E>(mut self, name: impl Into<String>, editor: &E, locator: Locator<M, T>) -> Self
    where
        T: Clone + 'static,
        E: Editor<T> + Clone + 'static,
    {
        let name = name.into();
        let editor = editor.clone();
        self.registrations
            .push(Box::new(move |binder| binder.bind(name, &editor, locator)));
        self
    }

    /// Bind an editor produced from the dependency bag at build time.
    ///
    /// Retrieve it afterwards with [`FormBinder::editor`].
    pub fn field_with<T, E, F>(mut self, name: impl Into<String>, locator: Locator<M, T>, factory: F) -> Self
    where
        T: Clone + 'static,
        E: Editor<T> + Clone + 'static,
        F: FnOnce(&Dependencies) -> E + 'static,
    {
        let name = name.into();
        self.registrations.push(Box::new(move |binder| {
            let editor = factory(binder.dependencies());
            binder.bind(name, &editor, locator)
        }));
        self
    }

    /// Append a model-level rule.
    pub fn rule(mut self, rule: impl Fn(&M) -> ValidationResult + 'static) -> Self {
        self.rules.push(Rc::new(rule));
        self
    }

    /// Create the binder and bind every field.
    pub fn build(self) -> Result<FormBinder<M>, BindError> {
        let binder = FormBinder::with_parts(self.model, self.config, self.dependencies);
        for register in self.registrations {
            register(&binder)?;
        }
        binder.inner.rules.borrow_mut().extend(self.rules);
        binder.inner.revalidate();
        Ok(binder)
    }
}

impl<M> fmt::Debug for FormBinderBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormBinderBuilder")
            .field("fields", &self.registrations.len())
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}
