//! Token-keyed subscriber registry shared by every event producer.
//!
//! Handlers are stored under a [`SubscriptionId`] issued at registration,
//! so cancelling is well-defined even while a dispatch is in flight. Each
//! dispatch runs against a snapshot of the registry taken before the first
//! handler is called: handlers added or removed during a dispatch only take
//! effect from the next one.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Token returned by `subscribe`, used to cancel the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// A registered handler.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered set of handlers for values of type `T`.
///
/// Handlers run in registration order.
pub struct SubscriberRegistry<T: ?Sized> {
    inner: Mutex<RegistryInner<T>>,
}

struct RegistryInner<T: ?Sized> {
    next_id: u64,
    handlers: BTreeMap<SubscriptionId, Handler<T>>,
}

impl<T: ?Sized> SubscriberRegistry<T> {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                handlers: BTreeMap::new(),
            }),
        }
    }

    /// Register a handler and return its cancellation token.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id = inner.next_id.wrapping_add(1);
        inner.handlers.insert(id, Arc::new(handler));
        id
    }

    /// Remove a handler. Returns `false` if the token was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().handlers.remove(&id).is_some()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.lock().handlers.clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Whether no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.lock().handlers.is_empty()
    }

    /// Deliver `value` once to every handler registered at call time.
    ///
    /// The registry lock is released before any handler runs, so handlers
    /// may subscribe or unsubscribe freely. Returns the number of handlers
    /// invoked.
    pub fn dispatch(&self, value: &T) -> usize {
        let handlers: Vec<Handler<T>> = self.lock().handlers.values().cloned().collect();
        for handler in &handlers {
            handler(value);
        }
        handlers.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for SubscriberRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish()
    }
}
