use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use crate::error::{ListenerError, ListenerFailure, ListenerOrigin, NotifyResult};
use crate::kind::NotificationKind;
use crate::listeners::ListenerSet;

/// The object a delegate reports on.
///
/// The delegate only holds a [`Weak`] reference to it. When dispatching, the
/// delegate upgrades that reference and turns it into the handle listeners
/// receive.
pub trait Notifier: Send + Sync + 'static {
    /// What listeners are called with.
    type Handle: 'static;

    /// A closed notifier receives no further notifications.
    fn is_closed(&self) -> bool;

    fn into_handle(self: Arc<Self>) -> Self::Handle;
}

/// A dependent that re-checks itself after every dispatch, such as a live
/// result view with listeners of its own.
pub trait ChangeObserver: Send + Sync {
    /// Called once per dispatch pass. Returns the failures of any callbacks
    /// the observer ran.
    fn on_change(&self) -> Vec<ListenerFailure>;
}

/// A notification listener.
pub type Listener<H> = dyn Fn(&H, NotificationKind) -> Result<(), ListenerError> + Send + Sync;

/// Fans change notifications out to listeners and observers.
pub struct NotificationDelegate<T: Notifier> {
    owner: Weak<T>,
    listeners: ListenerSet<Listener<T::Handle>>,
    observers: Mutex<Vec<Weak<dyn ChangeObserver>>>,
}

impl<T: Notifier> NotificationDelegate<T> {
    /// Create a delegate reporting on `owner`, typically from inside
    /// [`Arc::new_cyclic`].
    pub fn new(owner: Weak<T>) -> Self {
        Self {
            owner,
            listeners: ListenerSet::new(),
            observers: Mutex::new(Vec::new()),
        }
    }

    fn observers(&self) -> MutexGuard<'_, Vec<Weak<dyn ChangeObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener` for `kind`. Returns `false` if it was already
    /// registered.
    pub fn add_listener(&self, kind: &str, listener: Arc<Listener<T::Handle>>) -> NotifyResult<bool> {
        let kind: NotificationKind = kind.parse()?;
        let added = self.listeners.add(listener);
        debug!(%kind, added, listeners = self.listeners.len(), "add listener");
        Ok(added)
    }

    /// Unregister `listener`. Returns `false` if it was not registered.
    pub fn remove_listener(&self, kind: &str, listener: &Arc<Listener<T::Handle>>) -> NotifyResult<bool> {
        let _: NotificationKind = kind.parse()?;
        Ok(self.listeners.remove(listener))
    }

    /// Unregister every listener, or every listener of `kind`.
    pub fn remove_all_listeners(&self, kind: Option<&str>) -> NotifyResult<usize> {
        if let Some(kind) = kind {
            let _: NotificationKind = kind.parse()?;
        }
        Ok(self.listeners.clear())
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Register a weakly held observer. It is pruned once dropped.
    pub fn add_observer(&self, observer: Weak<dyn ChangeObserver>) {
        self.observers().push(observer);
    }

    /// Number of observers still alive.
    pub fn observer_count(&self) -> usize {
        self.observers()
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    /// Run one dispatch pass: every listener in registration order, then
    /// every live observer.
    ///
    /// A no-op if the owner is gone or closed. Listener failures are logged
    /// and returned; they never stop the pass.
    pub fn notify(&self) -> Vec<ListenerFailure> {
        let Some(owner) = self.owner.upgrade() else {
            debug!("notify skipped: owner dropped");
            return Vec::new();
        };
        if owner.is_closed() {
            debug!("notify skipped: owner closed");
            return Vec::new();
        }

        let listeners = self.listeners.snapshot();
        let observers: Vec<Arc<dyn ChangeObserver>> = {
            let mut observers = self.observers();
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        debug!(
            listeners = listeners.len(),
            observers = observers.len(),
            "dispatching change"
        );

        let handle = owner.into_handle();
        let mut failures = Vec::new();
        for (index, listener) in listeners.iter().enumerate() {
            if let Err(e) = listener(&handle, NotificationKind::Change) {
                warn!(index, error = %e, "change listener failed");
                failures.push(ListenerFailure::new(ListenerOrigin::Owner, index, &e));
            }
        }
        for observer in observers {
            failures.extend(observer.on_change());
        }
        failures
    }
}

impl<T: Notifier> fmt::Debug for NotificationDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationDelegate")
            .field("owner_alive", &(self.owner.strong_count() > 0))
            .field("listeners", &self.listeners.len())
            .field("observers", &self.observer_count())
            .finish()
    }
}
