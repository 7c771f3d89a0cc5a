use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An ordered set of callbacks compared by identity.
///
/// Adding a callback that is already present is a no-op, as is removing one
/// that is not. Dispatch iterates a [`snapshot`](Self::snapshot), so
/// callbacks may add or remove listeners while being called.
pub struct ListenerSet<F: ?Sized> {
    listeners: Mutex<Vec<Arc<F>>>,
}

impl<F: ?Sized> ListenerSet<F> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<F>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `listener`. Returns `false` if it was already registered.
    pub fn add(&self, listener: Arc<F>) -> bool {
        let mut listeners = self.lock();
        if listeners.iter().any(|l| same(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove `listener`. Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Arc<F>) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same(l, listener));
        listeners.len() != before
    }

    /// Remove every listener, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut listeners = self.lock();
        let n = listeners.len();
        listeners.clear();
        n
    }

    pub fn contains(&self, listener: &Arc<F>) -> bool {
        self.lock().iter().any(|l| same(l, listener))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current listeners in registration order.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.lock().clone()
    }
}

/// Identity of the allocation, ignoring trait-object metadata.
fn same<F: ?Sized>(a: &Arc<F>, b: &Arc<F>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl<F: ?Sized> Default for ListenerSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for ListenerSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}
