#![forbid(unsafe_code)]

//! Shared fixtures for fbind integration tests.
//!
//! - [`Profile`]: a small domain model with nested and optional slots, plus
//!   [`locators`] addressing each of them.
//! - [`ProfileForm`]: a [`FormBinder`] over `Profile` with one validated
//!   editor per slot.
//! - [`Recorder`]: collects every event a subscription delivers.
//! - [`ScriptedFetch`]: a fetch function whose results the test releases by
//!   hand, in any order.
//! - [`strategies`]: proptest strategies for profiles and edit scripts.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fbind_core::bus::Subscription;
use fbind_core::error::{BindError, FetchError};
use fbind_core::rules;
use fbind_runtime::binder::FormBinder;
use fbind_runtime::field::FieldEditor;
use fbind_runtime::locator;
use fbind_runtime::selection::AsyncSelectionField;
use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};
use tracing::trace;

pub const NAME_REQUIRED: &str = "name is required";
pub const AGE_OUT_OF_RANGE: &str = "age must be between 1 and 150";
pub const EMAIL_INVALID: &str = "email must contain @";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub city: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub age: u32,
    pub email: String,
    pub address: Address,
    pub fruit: Option<String>,
}

impl Profile {
    /// A profile that passes every [`ProfileForm`] rule.
    pub fn valid() -> Self {
        Self {
            name: "Ada".to_string(),
            age: 36,
            email: "ada@example.com".to_string(),
            address: Address {
                city: "London".to_string(),
            },
            fruit: None,
        }
    }
}

pub mod locators {
    use super::Profile;
    use fbind_runtime::locator;
    use fbind_runtime::locator::Locator;

    pub fn name() -> Locator<Profile, String> {
        locator!(Profile, name)
    }

    pub fn age() -> Locator<Profile, u32> {
        locator!(Profile, age)
    }

    pub fn email() -> Locator<Profile, String> {
        locator!(Profile, email)
    }

    pub fn city() -> Locator<Profile, String> {
        locator!(Profile, address.city)
    }

    pub fn fruit() -> Locator<Profile, Option<String>> {
        locator!(Profile, fruit)
    }
}

/// A binder over [`Profile`] with the name, age, email and city slots bound.
///
/// Rules: name non-empty, age in `1..=150`, email contains `@`. The city is
/// unvalidated.
pub struct ProfileForm {
    pub binder: FormBinder<Profile>,
    pub name: FieldEditor<String>,
    pub age: FieldEditor<u32>,
    pub email: FieldEditor<String>,
    pub city: FieldEditor<String>,
}

impl ProfileForm {
    pub fn new(profile: Profile) -> Result<Self, BindError> {
        let name = FieldEditor::with_rule(String::new(), rules::non_empty::<String>(NAME_REQUIRED));
        let age = FieldEditor::with_rule(0_u32, rules::range(1_u32, 150, AGE_OUT_OF_RANGE));
        let email = FieldEditor::with_rule(
            String::new(),
            rules::predicate(|s: &String| s.contains('@'), EMAIL_INVALID),
        );
        let city = FieldEditor::new(String::new());

        let binder = FormBinder::builder(profile)
            .field("name", &name, locators::name())
            .field("age", &age, locators::age())
            .field("email", &email, locators::email())
            .field("city", &city, locators::city())
            .build()?;

        Ok(Self {
            binder,
            name,
            age,
            email,
            city,
        })
    }

    /// The model as the editors currently show it.
    pub fn from_editors(&self, fruit: Option<String>) -> Profile {
        Profile {
            name: self.name.get(),
            age: self.age.get(),
            email: self.email.get(),
            address: Address {
                city: self.city.get(),
            },
            fruit,
        }
    }

    /// Write `profile`'s slots through the editors, one field at a time.
    pub fn type_in(&self, profile: &Profile) {
        self.name.set(profile.name.clone());
        self.age.set(profile.age);
        self.email.set(profile.email.clone());
        self.city.set(profile.address.city.clone());
    }
}

impl fmt::Debug for ProfileForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileForm")
            .field("binder", &self.binder)
            .finish_non_exhaustive()
    }
}

/// Bind an extra selection editor to the `fruit` slot.
pub fn bind_fruit(
    binder: &FormBinder<Profile>,
    field: &AsyncSelectionField<String, String>,
) -> Result<(), BindError> {
    binder.bind("fruit", field, locator!(Profile, fruit))
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Collects events in delivery order.
///
/// Clones share the same log.
#[derive(Clone)]
pub struct Recorder<T> {
    events: Rc<RefCell<Vec<T>>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: Clone + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that appends each delivered event.
    pub fn handler(&self) -> impl Fn(&T) + 'static {
        let events = Rc::clone(&self.events);
        move |event: &T| events.borrow_mut().push(event.clone())
    }

    /// Subscribe through `subscribe` and keep the returned subscription.
    pub fn attach(
        &self,
        subscribe: impl FnOnce(Box<dyn Fn(&T)>) -> Subscription,
    ) -> Subscription {
        subscribe(Box::new(self.handler()))
    }

    pub fn events(&self) -> Vec<T> {
        self.events.borrow().clone()
    }

    pub fn last(&self) -> Option<T> {
        self.events.borrow().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl<T: fmt::Debug> fmt::Debug for Recorder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Recorder").field(&self.events.borrow()).finish()
    }
}

// ---------------------------------------------------------------------------
// ScriptedFetch
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<Vec<T>, FetchError>>;

struct Request<T, Q> {
    query: Q,
    reply: Option<Reply<T>>,
}

/// A fetch function the test drives by hand.
///
/// Each call records its query and parks until [`resolve`](Self::resolve)
/// releases it. A request whose sender is dropped resolves to
/// [`FetchError::Unavailable`].
pub struct ScriptedFetch<T, Q> {
    requests: Rc<RefCell<Vec<Request<T, Q>>>>,
}

impl<T, Q> Clone for ScriptedFetch<T, Q> {
    fn clone(&self) -> Self {
        Self {
            requests: Rc::clone(&self.requests),
        }
    }
}

impl<T, Q> Default for ScriptedFetch<T, Q> {
    fn default() -> Self {
        Self {
            requests: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T: 'static, Q: Clone + PartialEq + fmt::Debug + 'static> ScriptedFetch<T, Q> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The function to hand to [`AsyncSelectionField::new`].
    pub fn fetch_fn(
        &self,
    ) -> impl Fn(Q) -> LocalBoxFuture<'static, Result<Vec<T>, FetchError>> + 'static {
        let requests = Rc::clone(&self.requests);
        move |query: Q| -> LocalBoxFuture<'static, Result<Vec<T>, FetchError>> {
            let (tx, rx) = oneshot::channel();
            trace!(?query, "scripted fetch requested");
            requests.borrow_mut().push(Request {
                query,
                reply: Some(tx),
            });
            async move {
                rx.await
                    .unwrap_or_else(|_| Err(FetchError::unavailable("reply dropped")))
            }
            .boxed_local()
        }
    }

    /// Queries in request order.
    pub fn queries(&self) -> Vec<Q> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.query.clone())
            .collect()
    }

    /// Number of requests made so far.
    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Release the latest unresolved request for `query`.
    ///
    /// Returns false when no such request is waiting (or its task is gone).
    pub fn resolve(&self, query: &Q, result: Result<Vec<T>, FetchError>) -> bool {
        let reply = self
            .requests
            .borrow_mut()
            .iter_mut()
            .rev()
            .filter(|request| request.query == *query)
            .find_map(|request| request.reply.take());
        match reply {
            Some(reply) => {
                trace!(?query, "scripted fetch resolved");
                reply.send(result).is_ok()
            }
            None => false,
        }
    }
}

impl<T, Q: fmt::Debug> fmt::Debug for ScriptedFetch<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requests = self.requests.borrow();
        let queries: Vec<&Q> = requests.iter().map(|request| &request.query).collect();
        f.debug_struct("ScriptedFetch")
            .field("queries", &queries)
            .finish()
    }
}

/// A fruit picker over a fixed catalogue: `"a"` finds `Apple`, anything
/// else finds nothing.
pub fn fruit_picker() -> AsyncSelectionField<String, String> {
    AsyncSelectionField::new(
        None,
        |query: String| async move {
            Ok(if query == "a" {
                vec!["Apple".to_string()]
            } else {
                Vec::new()
            })
        },
        |text: &str| text.trim().to_lowercase(),
    )
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

pub mod strategies {
    use super::{Address, Profile};
    use proptest::prelude::*;

    pub fn arb_profile() -> impl Strategy<Value = Profile> {
        (
            "[A-Za-z ]{0,12}",
            0_u32..200,
            "[a-z@.]{0,16}",
            "[A-Za-z]{0,10}",
            proptest::option::of("[A-Z][a-z]{0,6}"),
        )
            .prop_map(|(name, age, email, city, fruit)| Profile {
                name,
                age,
                email,
                address: Address { city },
                fruit,
            })
    }

    /// One write to one [`ProfileForm`](super::ProfileForm) editor.
    #[derive(Debug, Clone)]
    pub enum Edit {
        Name(String),
        Age(u32),
        Email(String),
        City(String),
    }

    pub fn arb_edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            "[a-z]{0,8}".prop_map(Edit::Name),
            (0_u32..200).prop_map(Edit::Age),
            "[a-z@]{0,8}".prop_map(Edit::Email),
            "[A-Z][a-z]{0,6}".prop_map(Edit::City),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;

    #[test]
    fn valid_profile_passes() {
        let form = ProfileForm::new(Profile::valid()).expect("form");
        assert!(form.binder.is_valid());
        assert_eq!(form.from_editors(None), Profile::valid());
    }

    #[test]
    fn recorder_collects_in_order() {
        let editor = FieldEditor::new(0_u8);
        let recorder: Recorder<u8> = Recorder::new();
        let _sub = recorder.attach(|h| editor.on_change(h));
        editor.set(1);
        editor.set(2);
        assert_eq!(recorder.events(), vec![1, 2]);
        assert_eq!(recorder.last(), Some(2));
    }

    #[test]
    fn scripted_fetch_resolves_by_query() {
        let script: ScriptedFetch<String, String> = ScriptedFetch::new();
        let fetch = script.fetch_fn();
        let mut pool = LocalPool::new();
        let results: Recorder<Result<Vec<String>, FetchError>> = Recorder::new();

        for q in ["x", "y"] {
            let fut = fetch(q.to_string());
            let record = results.handler();
            pool.spawner()
                .spawn_local(async move { record(&fut.await) })
                .expect("spawn");
        }
        pool.run_until_stalled();
        assert_eq!(script.queries(), vec!["x".to_string(), "y".to_string()]);
        assert!(results.is_empty());

        assert!(script.resolve(&"y".to_string(), Ok(vec!["Y".to_string()])));
        pool.run_until_stalled();
        assert_eq!(results.events(), vec![Ok(vec!["Y".to_string()])]);
        assert!(!script.resolve(&"y".to_string(), Ok(Vec::new())));
    }
}
