#![forbid(unsafe_code)]

//! Lifetime management for groups of subscriptions.

use std::fmt;

use fbind_core::bus::Subscription;

/// Holds the subscriptions of one logical owner (a binder, a view).
///
/// When the scope is dropped, every held subscription is cancelled.
///
/// # Invariants
///
/// 1. Subscriptions are released in reverse registration order.
/// 2. After drop or [`clear`](Self::clear), no callback held by this scope fires.
/// 3. A cleared scope can be reused.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Cancel everything now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(subscription) = self.subscriptions.pop() {
            subscription.cancel();
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}
