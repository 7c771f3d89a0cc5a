//! Change notification for Vista sessions.
//!
//! A [`NotificationDelegate`] belongs to the object it reports on but refers
//! back to it only weakly, so a session can be closed or dropped while
//! listeners are still registered. Dispatch then silently does nothing.
//!
//! Listener sets are ordered and deduplicated by identity; every dispatch
//! iterates a copy, so a listener may register or remove listeners while it
//! runs.

pub mod delegate;
pub mod error;
pub mod kind;
pub mod listeners;

pub use delegate::{ChangeObserver, Listener, NotificationDelegate, Notifier};
pub use error::{ListenerError, ListenerFailure, ListenerOrigin, NotifyError, NotifyResult};
pub use kind::NotificationKind;
pub use listeners::ListenerSet;
