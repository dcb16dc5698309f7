#![forbid(unsafe_code)]

//! Bidirectional value adapters.
//!
//! A [`ValueAdapter<S, T>`] presents a source editor's value of type `S` as a
//! value of type `T`. Writes to the adapter flow back into the source
//! through `backward`; writes to the source flow into the adapter through
//! `forward`.
//!
//! ```
//! use fbind_runtime::adapter::ValueAdapter;
//! use fbind_runtime::field::FieldEditor;
//!
//! let cents = FieldEditor::new(1250_i64);
//! let euros = ValueAdapter::new(
//!     &cents,
//!     |c: &i64| format!("{:.2}", *c as f64 / 100.0),
//!     |s: &String| s.parse::<f64>().map_or(0, |e| (e * 100.0).round() as i64),
//! );
//! assert_eq!(euros.get(), "12.50");
//!
//! euros.set("3.10".to_string());
//! assert_eq!(cents.get(), 310);
//!
//! cents.set(99);
//! assert_eq!(euros.get(), "0.99");
//! ```
//!
//! # Invariants
//!
//! 1. An adapter write publishes once on the source and once on the adapter,
//!    and never runs `forward` on its own echo.
//! 2. A source write publishes once on the adapter.
//! 3. After any write, the side that was not written holds the transform of
//!    the side that was.
//! 4. Dropping every handle to the adapter disconnects it from the source.
//! 5. If a source subscriber rewrites the source while an adapter write is
//!    flowing back, the adapter settles on `forward` of the rewritten value
//!    instead of what was written.
//!
//! # Failure Modes
//!
//! - Transform panic: propagates to the writer. A panic in `backward` or in a
//!   source subscriber leaves the guard raised, so later source writes are
//!   ignored by this adapter.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use fbind_core::bus::Subscription;
use fbind_core::validation::{Validate, ValidationResult};
use tracing::trace;

use crate::field::{Editor, FieldEditor};

type SourceWrite<S> = Box<dyn Fn(S)>;
type SourceRead<S> = Box<dyn Fn() -> S>;
type SourceValidate = Box<dyn Fn() -> ValidationResult>;

struct AdapterInner<S, T> {
    target: FieldEditor<T>,
    forward: Rc<dyn Fn(&S) -> T>,
    backward: Box<dyn Fn(&T) -> S>,
    read_source: SourceRead<S>,
    write_source: SourceWrite<S>,
    validate_source: SourceValidate,
    syncing: Rc<Cell<bool>>,
    _source_sub: Subscription,
}

/// A transformed, two-way view of another editor's value.
///
/// Cloning yields another handle to the same adapter.
pub struct ValueAdapter<S, T> {
    inner: Rc<AdapterInner<S, T>>,
}

impl<S, T> Clone for ValueAdapter<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: Clone + PartialEq + 'static, T: Clone + 'static> ValueAdapter<S, T> {
    /// Adapt `source`. The adapter starts at `forward(source.value())`.
    pub fn new<E>(
        source: &E,
        forward: impl Fn(&S) -> T + 'static,
        backward: impl Fn(&T) -> S + 'static,
    ) -> Self
    where
        E: Editor<S> + Clone + 'static,
    {
        let forward: Rc<dyn Fn(&S) -> T> = Rc::new(forward);
        let target = FieldEditor::new(forward(&source.value()));
        let syncing = Rc::new(Cell::new(false));

        // source → adapter
        let source_sub = {
            let target = target.clone();
            let forward = Rc::clone(&forward);
            let guard = Rc::clone(&syncing);
            source.watch(move |value| {
                if guard.get() {
                    return;
                }
                trace!("adapter: source → target");
                target.set(forward(value));
            })
        };

        let reader = source.clone();
        let writer = source.clone();
        let validator = source.clone();
        Self {
            inner: Rc::new(AdapterInner {
                target,
                forward,
                backward: Box::new(backward),
                read_source: Box::new(move || reader.value()),
                write_source: Box::new(move |value| writer.set_value(value)),
                validate_source: Box::new(move || validator.validate()),
                syncing,
                _source_sub: source_sub,
            }),
        }
    }

    /// Current adapted value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.target.get()
    }

    /// Write through to the source as `backward(value)`, then publish
    /// `value` to the adapter's own subscribers.
    ///
    /// If the source ends up holding something other than `backward(value)`
    /// (a source subscriber rewrote it), the adapter publishes `forward` of
    /// the source's final value instead.
    pub fn set(&self, value: T) {
        let inner = &self.inner;
        let upstream = (inner.backward)(&value);

        // adapter → source
        inner.syncing.set(true);
        trace!("adapter: target → source");
        (inner.write_source)(upstream.clone());
        inner.syncing.set(false);

        let settled = (inner.read_source)();
        if settled == upstream {
            inner.target.set(value);
        } else {
            trace!("adapter: source rewritten during write-back");
            inner.target.set((inner.forward)(&settled));
        }
    }

    /// Observe the adapted value.
    pub fn on_change(&self, handler: impl Fn(&T) + 'static) -> Subscription {
        self.inner.target.on_change(handler)
    }

    /// Validation of the underlying source.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        (self.inner.validate_source)()
    }

    /// Number of adapter writes plus source-driven updates.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.target.version()
    }
}

impl<S: Clone + PartialEq + 'static, T: Clone + 'static> Validate for ValueAdapter<S, T> {
    fn validate(&self) -> ValidationResult {
        ValueAdapter::validate(self)
    }
}

impl<S: Clone + PartialEq + 'static, T: Clone + 'static> Editor<T> for ValueAdapter<S, T> {
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

impl<S, T: fmt::Debug + Clone + 'static> fmt::Debug for ValueAdapter<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAdapter")
            .field("value", &self.inner.target.get())
            .field("syncing", &self.inner.syncing.get())
            .finish()
    }
}
