//! Sessions, transactions and live result views for Vista.
//!
//! A [`Session`] is the entry point: it opens a store as described by a
//! [`Configuration`], runs write transactions, creates and deletes
//! [`Object`]s and hands out [`ResultView`]s that stay current as the store
//! changes.
//!
//! # Transactions
//!
//! A session is either idle or writing. [`Session::begin_write`] moves it to
//! writing and returns a [`WriteScope`]; committing publishes the changes and
//! then notifies, synchronously and in registration order:
//!
//! 1. session listeners registered for `"change"`;
//! 2. live result views with listeners, whose callbacks only fire if their
//!    key sequence changed;
//! 3. other sessions open on the same store.
//!
//! A listener that fails does not stop the others; the commit stands and
//! reports the failures as [`SessionError::ListenerFailed`].
//!
//! # Views
//!
//! [`ResultView::filtered`] and [`ResultView::sorted`] derive new views and
//! never change the one they are called on. [`ResultView::snapshot`] freezes
//! the key sequence: indices stay put and deleted objects read as `None`.

pub mod config;
pub mod delete;
pub mod error;
pub mod list;
pub mod object;
pub mod results;
pub mod session;
pub mod transaction;

pub use config::{Configuration, ENCRYPTION_KEY_LEN};
pub use delete::DeleteTarget;
pub use error::{ErrorKind, SessionError, SessionResult};
pub use list::ListView;
pub use object::{Object, Properties};
pub use results::{ResultView, SortSpec, ViewListener};
pub use session::{Session, SessionListener};
pub use transaction::WriteScope;

pub use vista_notify::{ListenerError, ListenerFailure, ListenerOrigin, NotificationKind};
pub use vista_query::{PredicateCompiler, ViewChange};
pub use vista_schema::{ObjectDefaults, ObjectFactory, ObjectSchema, Property, Schema};
pub use vista_types::{ObjectKey, PropertyType, SchemaVersion, Value};
