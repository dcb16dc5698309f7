#![forbid(unsafe_code)]

//! Getter/setter pairs addressing one slot of a domain model.

use std::fmt;
use std::rc::Rc;

/// Addresses one slot of type `T` inside a model `M`.
///
/// Locators are stateless and cheap to clone. The setter must be total: it
/// may not fail for any value of `T`.
///
/// ```
/// use fbind_runtime::locator;
///
/// #[derive(Clone, Default)]
/// struct Person { name: String }
///
/// let name = locator!(Person, name);
/// let mut p = Person::default();
/// name.set(&mut p, "Ada".to_string());
/// assert_eq!(name.get(&p), "Ada");
/// ```
pub struct Locator<M, T> {
    get: Rc<dyn Fn(&M) -> T>,
    set: Rc<dyn Fn(&mut M, T)>,
}

impl<M, T> Clone for Locator<M, T> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            set: Rc::clone(&self.set),
        }
    }
}

impl<M: 'static, T: 'static> Locator<M, T> {
    /// Build a locator from its two halves.
    pub fn new(get: impl Fn(&M) -> T + 'static, set: impl Fn(&mut M, T) + 'static) -> Self {
        Self {
            get: Rc::new(get),
            set: Rc::new(set),
        }
    }

    /// Read the slot.
    pub fn get(&self, model: &M) -> T {
        (self.get)(model)
    }

    /// Write the slot.
    pub fn set(&self, model: &mut M, value: T) {
        (self.set)(model, value);
    }

    /// Address a slot nested inside this one.
    pub fn then<U: 'static>(&self, inner: &Locator<T, U>) -> Locator<M, U> {
        let outer_get = self.clone();
        let inner_get = inner.clone();
        let outer_set = self.clone();
        let inner_set = inner.clone();
        Locator::new(
            move |model| inner_get.get(&outer_get.get(model)),
            move |model, value| {
                let mut slot = outer_set.get(model);
                inner_set.set(&mut slot, value);
                outer_set.set(model, slot);
            },
        )
    }
}

impl<M, T> fmt::Debug for Locator<M, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("model", &std::any::type_name::<M>())
            .field("slot", &std::any::type_name::<T>())
            .finish()
    }
}

/// Build a [`Locator`] for a (possibly nested) struct field.
///
/// `locator!(Model, a.b)` reads `model.a.b.clone()` and writes
/// `model.a.b = value`.
#[macro_export]
macro_rules! locator {
    ($model:ty, $($field:ident).+) => {
        $crate::locator::Locator::new(
            |model: &$model| model.$($field).+.clone(),
            |model: &mut $model, value| model.$($field).+ = value,
        )
    };
}
