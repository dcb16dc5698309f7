#![forbid(unsafe_code)]

//! Selection fields whose candidates come from an asynchronous query.
//!
//! An [`AsyncSelectionField<T, Q>`] is an editor over `Option<T>` (the
//! current selection) plus a [`CandidateState`] describing the most recent
//! search. Searching never blocks: [`AsyncSelectionField::search`] moves the
//! state to `Loading` synchronously and returns a [`SearchTask`] future that
//! runs the fetch when polled, on whatever local executor the caller uses.
//!
//! # State Machine
//!
//! ```text
//! Initial ──search(q)──▶ Loading(q) ──ok──▶ Loaded(q, items)
//!    ▲                      │  ▲     └─err─▶ Failed(q, error)
//!    └──────reset()─────────┘  └──search(q')── (from any state)
//! ```
//!
//! # Invariants
//!
//! 1. Every `search` call starts a new generation; only a task whose
//!    generation is still current may move the state out of `Loading`.
//! 2. A superseded result is discarded silently. It is never reported as a
//!    failure.
//! 3. Aborting a superseded fetch never changes the candidate state.
//! 4. Selecting a value is independent of the candidate state.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Fetch error | `fetch` resolves to `Err` | `Failed(q, error)` if current, else dropped |
//! | Stale result | a newer search was issued | dropped, logged at debug |
//! | Field dropped | all handles gone before completion | task finishes without effect |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use fbind_core::bus::{Channel, Subscription};
use fbind_core::error::FetchError;
use fbind_core::validation::{Validate, ValidationResult};
use futures::future::{AbortHandle, Abortable, FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt, SpawnError};
use tracing::debug;

use crate::config::SelectionConfig;
use crate::field::{Editor, FieldEditor};

/// Where the candidate list stands for the latest search.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateState<T, Q> {
    /// No search issued yet (or reset since).
    Initial,
    /// A fetch for `Q` is outstanding.
    Loading(Q),
    /// The fetch for `Q` produced these candidates.
    Loaded(Q, Vec<T>),
    /// The fetch for `Q` failed.
    Failed(Q, FetchError),
}

impl<T, Q> CandidateState<T, Q> {
    /// The query this state belongs to, if any.
    #[must_use]
    pub fn query(&self) -> Option<&Q> {
        match self {
            Self::Initial => None,
            Self::Loading(q) | Self::Loaded(q, _) | Self::Failed(q, _) => Some(q),
        }
    }

    /// Loaded candidates; empty in every other state.
    #[must_use]
    pub fn items(&self) -> &[T] {
        match self {
            Self::Loaded(_, items) => items,
            _ => &[],
        }
    }

    /// Whether a fetch is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// The fetch error, if the latest search failed.
    #[must_use]
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Failed(_, error) => Some(error),
            _ => None,
        }
    }
}

type FetchFn<T, Q> = Box<dyn Fn(Q) -> LocalBoxFuture<'static, Result<Vec<T>, FetchError>>>;
type QueryBuilder<Q> = Box<dyn Fn(&str) -> Q>;

struct SelectionInner<T, Q> {
    editor: FieldEditor<Option<T>>,
    fetch: FetchFn<T, Q>,
    query_builder: QueryBuilder<Q>,
    config: Cell<SelectionConfig>,
    query: RefCell<Option<Q>>,
    state: RefCell<CandidateState<T, Q>>,
    state_changes: Channel<CandidateState<T, Q>>,
    generation: Cell<u64>,
    in_flight: RefCell<Option<AbortHandle>>,
}

impl<T: Clone + 'static, Q: Clone + 'static> SelectionInner<T, Q> {
    fn transition(&self, next: CandidateState<T, Q>) {
        *self.state.borrow_mut() = next.clone();
        self.state_changes.publish(&next);
    }

    fn supersede(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if let Some(previous) = self.in_flight.borrow_mut().take()
            && self.config.get().cancel_superseded
        {
            debug!(generation, "aborting superseded fetch");
            previous.abort();
        }
        generation
    }
}

/// A selection field with asynchronously loaded candidates.
///
/// Cloning yields another handle to the same field.
///
/// ```
/// use fbind_runtime::selection::{AsyncSelectionField, CandidateState};
///
/// let fruit = AsyncSelectionField::new(
///     None,
///     |q: String| async move {
///         Ok(if q == "a" { vec!["Apple".to_string()] } else { vec![] })
///     },
///     |text: &str| text.to_string(),
/// );
///
/// futures::executor::block_on(fruit.search("a".to_string()));
/// assert_eq!(
///     fruit.candidates(),
///     CandidateState::Loaded("a".to_string(), vec!["Apple".to_string()])
/// );
/// ```
pub struct AsyncSelectionField<T, Q> {
    inner: Rc<SelectionInner<T, Q>>,
}

impl<T, Q> Clone for AsyncSelectionField<T, Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static, Q: Clone + 'static> AsyncSelectionField<T, Q> {
    /// Create a field with an initial selection, a fetch function, and a
    /// builder turning typed search text into a query.
    pub fn new<F, Fut, B>(value: Option<T>, fetch: F, query_builder: B) -> Self
    where
        F: Fn(Q) -> Fut + 'static,
        Fut: Future<Output = Result<Vec<T>, FetchError>> + 'static,
        B: Fn(&str) -> Q + 'static,
    {
        Self {
            inner: Rc::new(SelectionInner {
                editor: FieldEditor::new(value),
                fetch: Box::new(move |query| fetch(query).boxed_local()),
                query_builder: Box::new(query_builder),
                config: Cell::new(SelectionConfig::default()),
                query: RefCell::new(None),
                state: RefCell::new(CandidateState::Initial),
                state_changes: Channel::new(),
                generation: Cell::new(0),
                in_flight: RefCell::new(None),
            }),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(self, config: SelectionConfig) -> Self {
        self.inner.config.set(config);
        self
    }

    /// Validate the selection with `rule`.
    #[must_use]
    pub fn with_rule(self, rule: impl Fn(&Option<T>) -> ValidationResult + 'static) -> Self {
        self.inner.editor.set_rule(rule);
        self
    }

    /// Issue a search for `query`.
    ///
    /// The state becomes `Loading(query)` before this returns. The fetch
    /// itself runs when the returned task is polled.
    pub fn search(&self, query: Q) -> SearchTask {
        let inner = &self.inner;
        let generation = inner.supersede();
        *inner.query.borrow_mut() = Some(query.clone());

        let (handle, registration) = AbortHandle::new_pair();
        *inner.in_flight.borrow_mut() = Some(handle);

        debug!(generation, "search issued");
        if inner.config.get().clear_selection_on_search {
            inner.editor.set(None);
        }
        inner.transition(CandidateState::Loading(query.clone()));

        let weak: Weak<SelectionInner<T, Q>> = Rc::downgrade(inner);
        // Created lazily so an abort before the first poll skips the fetch.
        let fetch = {
            let weak = Weak::clone(&weak);
            let query = query.clone();
            async move {
                let inner = weak.upgrade()?;
                let pending = (inner.fetch)(query);
                drop(inner);
                Some(pending.await)
            }
        };
        let task = async move {
            let outcome = Abortable::new(fetch, registration).await;

            let result = match outcome {
                Ok(Some(result)) => result,
                Ok(None) => {
                    debug!(generation, "field dropped before fetch");
                    return;
                }
                Err(_aborted) => {
                    debug!(generation, "fetch aborted");
                    return;
                }
            };
            let Some(inner) = weak.upgrade() else {
                debug!(generation, "field dropped while fetching");
                return;
            };
            if inner.generation.get() != generation {
                debug!(
                    generation,
                    current = inner.generation.get(),
                    "discarding stale fetch result"
                );
                return;
            }

            inner.in_flight.borrow_mut().take();
            match result {
                Ok(items) => inner.transition(CandidateState::Loaded(query, items)),
                Err(error) => {
                    debug!(generation, %error, "fetch failed");
                    inner.transition(CandidateState::Failed(query, error));
                }
            }
        };

        SearchTask {
            future: task.boxed_local(),
        }
    }

    /// Build a query from typed text and search for it.
    pub fn search_text(&self, text: &str) -> SearchTask {
        let query = (self.inner.query_builder)(text);
        self.search(query)
    }

    /// Issue a search and hand its task to `spawner`.
    pub fn spawn_search<S>(&self, spawner: &S, query: Q) -> Result<(), SpawnError>
    where
        S: LocalSpawn + ?Sized,
    {
        spawner.spawn_local(self.search(query))
    }

    /// Return to `Initial`, invalidating any outstanding fetch.
    pub fn reset(&self) {
        self.inner.supersede();
        self.inner.query.borrow_mut().take();
        self.inner.transition(CandidateState::Initial);
    }

    /// Current candidate state.
    #[must_use]
    pub fn candidates(&self) -> CandidateState<T, Q> {
        self.inner.state.borrow().clone()
    }

    /// The most recently issued query.
    #[must_use]
    pub fn query(&self) -> Option<Q> {
        self.inner.query.borrow().clone()
    }

    /// Whether the latest search is still outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// Observe candidate state transitions.
    pub fn on_candidates_changed(
        &self,
        handler: impl Fn(&CandidateState<T, Q>) + 'static,
    ) -> Subscription {
        self.inner.state_changes.subscribe(handler)
    }

    /// Current selection.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.editor.get()
    }

    /// Replace the selection.
    pub fn set(&self, value: Option<T>) {
        self.inner.editor.set(value);
    }

    /// Select `item`. It need not be among the loaded candidates.
    pub fn select(&self, item: T) {
        self.inner.editor.set(Some(item));
    }

    /// Clear the selection.
    pub fn clear_selection(&self) {
        self.inner.editor.set(None);
    }

    /// Observe selection changes.
    pub fn on_change(&self, handler: impl Fn(&Option<T>) + 'static) -> Subscription {
        self.inner.editor.on_change(handler)
    }

    /// Validation of the current selection.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.inner.editor.validate()
    }

    /// The underlying selection editor.
    #[must_use]
    pub fn editor(&self) -> &FieldEditor<Option<T>> {
        &self.inner.editor
    }
}

impl<T: Clone + 'static, Q: Clone + 'static> Validate for AsyncSelectionField<T, Q> {
    fn validate(&self) -> ValidationResult {
        AsyncSelectionField::validate(self)
    }
}

impl<T: Clone + 'static, Q: Clone + 'static> Editor<Option<T>> for AsyncSelectionField<T, Q> {
    fn value(&self) -> Option<T> {
        self.get()
    }

    fn set_value(&self, value: Option<T>) {
        self.set(value);
    }

    fn watch(&self, handler: impl Fn(&Option<T>) + 'static) -> Subscription {
        self.on_change(handler)
    }
}

impl<T: fmt::Debug, Q: fmt::Debug> fmt::Debug for AsyncSelectionField<T, Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSelectionField")
            .field("selection", &self.inner.editor)
            .field("state", &*self.inner.state.borrow())
            .field("generation", &self.inner.generation.get())
            .finish()
    }
}

/// The pending half of a search: drive it to completion on any executor.
///
/// Dropping the task without polling it leaves the field in `Loading` until
/// the next search or [`reset`](AsyncSelectionField::reset).
#[must_use = "a search does nothing unless its task is polled"]
pub struct SearchTask {
    future: LocalBoxFuture<'static, ()>,
}

impl Future for SearchTask {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchTask").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbind_core::rules;
    use futures::channel::oneshot;
    use futures::executor::{LocalPool, block_on};
    use std::collections::VecDeque;
    use tracing_test::traced_test;

    type Reply = Result<Vec<String>, FetchError>;
    type Pending = Rc<RefCell<VecDeque<(String, oneshot::Sender<Reply>)>>>;

    fn fruit_field() -> AsyncSelectionField<String, String> {
        AsyncSelectionField::new(
            None,
            |q: String| async move {
                Ok(if q == "a" {
                    vec!["Apple".to_string()]
                } else {
                    Vec::new()
                })
            },
            |text: &str| text.trim().to_lowercase(),
        )
    }

    /// A field whose fetches wait until the test answers them.
    fn manual_field() -> (AsyncSelectionField<String, String>, Pending) {
        let pending: Pending = Rc::new(RefCell::new(VecDeque::new()));
        let p = Rc::clone(&pending);
        let field = AsyncSelectionField::new(
            None,
            move |q: String| {
                let (tx, rx) = oneshot::channel();
                p.borrow_mut().push_back((q, tx));
                async move {
                    rx.await
                        .unwrap_or_else(|_| Err(FetchError::unavailable("dropped")))
                }
            },
            str::to_string,
        );
        (field, pending)
    }

    fn answer(pending: &Pending, query: &str, reply: Reply) {
        let mut queue = pending.borrow_mut();
        let pos = queue
            .iter()
            .position(|(q, _)| q == query)
            .expect("query was fetched");
        let (_, tx) = queue.remove(pos).expect("position is in range");
        let _ = tx.send(reply);
    }

    #[test]
    fn starts_initial() {
        let field = fruit_field();
        assert_eq!(field.candidates(), CandidateState::Initial);
        assert_eq!(field.query(), None);
        assert_eq!(field.get(), None);
    }

    #[test]
    fn search_loads_apple() {
        let field = fruit_field();
        block_on(field.search("a".to_string()));
        assert_eq!(
            field.candidates(),
            CandidateState::Loaded("a".to_string(), vec!["Apple".to_string()])
        );
    }

    #[test]
    fn loading_is_synchronous() {
        let field = fruit_field();
        let task = field.search("a".to_string());
        assert_eq!(field.candidates(), CandidateState::Loading("a".to_string()));
        assert!(field.is_loading());
        block_on(task);
        assert!(!field.is_loading());
    }

    #[test]
    fn search_text_uses_query_builder() {
        let field = fruit_field();
        block_on(field.search_text("  A "));
        assert_eq!(field.query(), Some("a".to_string()));
        assert_eq!(field.candidates().items(), ["Apple".to_string()]);
    }

    #[test]
    fn failure_becomes_state() {
        let field: AsyncSelectionField<String, String> = AsyncSelectionField::new(
            None,
            |_q: String| async { Err(FetchError::unavailable("offline")) },
            str::to_string,
        );
        block_on(field.search("x".to_string()));
        assert_eq!(
            field.candidates(),
            CandidateState::Failed("x".to_string(), FetchError::unavailable("offline"))
        );
        assert_eq!(
            field.candidates().error(),
            Some(&FetchError::unavailable("offline"))
        );
    }

    #[test]
    fn stale_result_is_discarded_without_cancellation() {
        let (field, pending) = manual_field();
        let field = field.with_config(SelectionConfig::default().cancel_superseded(false));
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        field.spawn_search(&spawner, "a".to_string()).expect("spawn");
        field.spawn_search(&spawner, "b".to_string()).expect("spawn");
        pool.run_until_stalled();
        assert_eq!(pending.borrow().len(), 2);

        answer(&pending, "b", Ok(vec!["Banana".to_string()]));
        pool.run_until_stalled();
        answer(&pending, "a", Ok(vec!["Apple".to_string()]));
        pool.run_until_stalled();

        assert_eq!(
            field.candidates(),
            CandidateState::Loaded("b".to_string(), vec!["Banana".to_string()])
        );
    }

    #[test]
    fn superseded_fetch_is_aborted_before_running() {
        let (field, pending) = manual_field();
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        field.spawn_search(&spawner, "a".to_string()).expect("spawn");
        field.spawn_search(&spawner, "b".to_string()).expect("spawn");
        pool.run_until_stalled();

        // "a" was aborted before its first poll.
        assert_eq!(pending.borrow().len(), 1);
        assert_eq!(field.candidates(), CandidateState::Loading("b".to_string()));

        answer(&pending, "b", Ok(Vec::new()));
        pool.run_until_stalled();
        assert_eq!(
            field.candidates(),
            CandidateState::Loaded("b".to_string(), Vec::new())
        );
    }

    #[test]
    fn stale_failure_is_not_surfaced() {
        let (field, pending) = manual_field();
        let field = field.with_config(SelectionConfig::default().cancel_superseded(false));
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        field.spawn_search(&spawner, "a".to_string()).expect("spawn");
        pool.run_until_stalled();
        field.spawn_search(&spawner, "b".to_string()).expect("spawn");
        pool.run_until_stalled();

        answer(&pending, "a", Err(FetchError::rejected("boom")));
        pool.run_until_stalled();
        assert_eq!(field.candidates(), CandidateState::Loading("b".to_string()));
    }

    #[test]
    fn state_transitions_are_published() {
        let field = fruit_field();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = field.on_candidates_changed(move |state| s.borrow_mut().push(state.clone()));

        block_on(field.search("a".to_string()));
        assert_eq!(
            *seen.borrow(),
            vec![
                CandidateState::Loading("a".to_string()),
                CandidateState::Loaded("a".to_string(), vec!["Apple".to_string()]),
            ]
        );
    }

    #[test]
    fn selection_is_independent_of_candidates() {
        let field = fruit_field().with_rule(rules::required::<String>("pick a fruit"));
        assert!(!field.validate().is_valid());

        field.select("Durian".to_string());
        assert_eq!(field.get(), Some("Durian".to_string()));
        assert_eq!(field.candidates(), CandidateState::Initial);
        assert!(field.validate().is_valid());

        field.clear_selection();
        assert!(!field.validate().is_valid());
    }

    #[test]
    fn clear_selection_on_search() {
        let field = fruit_field()
            .with_config(SelectionConfig::default().clear_selection_on_search(true));
        field.select("Apple".to_string());
        block_on(field.search("a".to_string()));
        assert_eq!(field.get(), None);
    }

    #[test]
    fn reset_invalidates_in_flight() {
        let (field, pending) = manual_field();
        let field = field.with_config(SelectionConfig::default().cancel_superseded(false));
        let mut pool = LocalPool::new();
        field
            .spawn_search(&pool.spawner(), "a".to_string())
            .expect("spawn");
        pool.run_until_stalled();

        field.reset();
        answer(&pending, "a", Ok(vec!["Apple".to_string()]));
        pool.run_until_stalled();
        assert_eq!(field.candidates(), CandidateState::Initial);
        assert_eq!(field.query(), None);
    }

    #[test]
    #[traced_test]
    fn dropped_field_leaves_task_inert() {
        let (field, pending) = manual_field();
        let mut pool = LocalPool::new();
        field
            .spawn_search(&pool.spawner(), "a".to_string())
            .expect("spawn");
        pool.run_until_stalled();
        drop(field);

        answer(&pending, "a", Ok(vec!["Apple".to_string()]));
        pool.run_until_stalled();
        assert!(logs_contain("field dropped while fetching"));
    }

    #[test]
    #[traced_test]
    fn field_dropped_before_fetch_is_not_an_abort() {
        let (field, pending) = manual_field();
        let mut pool = LocalPool::new();
        field
            .spawn_search(&pool.spawner(), "a".to_string())
            .expect("spawn");
        drop(field);
        pool.run_until_stalled();

        assert!(pending.borrow().is_empty());
        assert!(logs_contain("field dropped before fetch"));
        assert!(!logs_contain("fetch aborted"));
    }

    #[test]
    #[traced_test]
    fn stale_discard_is_logged() {
        let (field, pending) = manual_field();
        let field = field.with_config(SelectionConfig::default().cancel_superseded(false));
        let mut pool = LocalPool::new();
        let spawner = pool.spawner();

        field.spawn_search(&spawner, "a".to_string()).expect("spawn");
        field.spawn_search(&spawner, "b".to_string()).expect("spawn");
        pool.run_until_stalled();
        answer(&pending, "a", Ok(Vec::new()));
        pool.run_until_stalled();

        assert!(logs_contain("discarding stale fetch result"));
    }
}
