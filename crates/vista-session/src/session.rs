use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tracing::{debug, info, warn};
use vista_notify::{ChangeObserver, Listener, NotificationDelegate, Notifier};
use vista_query::{DefaultCompiler, PredicateCompiler, Query};
use vista_schema::{DefaultsRegistry, ObjectDefaults, ObjectFactory, ObjectSchema, Schema};
use vista_store::{CommitObserver, Group, ObserverId, Store, StoreHandle, WriteTransaction};
use vista_types::{ObjectKey, SchemaVersion, Value};

use crate::config::Configuration;
use crate::error::{SessionError, SessionResult};
use crate::object::Object;
use crate::results::ResultView;
use crate::transaction::WriteScope;

/// A session-level change listener. Called with the session that committed
/// and the notification kind.
pub type SessionListener = Listener<Session>;

/// The write transaction a session currently holds.
struct Writing {
    serial: u64,
    txn: WriteTransaction,
}

/// State shared by every clone of a [`Session`].
pub(crate) struct Shared {
    config: Configuration,
    schema: Schema,
    store: Mutex<Option<StoreHandle>>,
    txn: Mutex<Option<Writing>>,
    serial: AtomicU64,
    delegate: NotificationDelegate<Shared>,
    defaults: RwLock<DefaultsRegistry>,
    compiler: Arc<dyn PredicateCompiler>,
    observer: ObserverId,
    // Registered weakly with the store; kept alive here.
    _peer: Arc<PeerLink>,
}

impl Shared {
    fn store(&self) -> MutexGuard<'_, Option<StoreHandle>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn txn(&self) -> MutexGuard<'_, Option<Writing>> {
        self.txn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for Shared {
    type Handle = Session;

    fn is_closed(&self) -> bool {
        self.store().is_none()
    }

    fn into_handle(self: Arc<Self>) -> Session {
        Session { shared: self }
    }
}

/// Relays commits made by other sessions on the same store.
struct PeerLink {
    shared: Weak<Shared>,
}

impl CommitObserver for PeerLink {
    fn on_commit(&self, version: u64) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let failures = shared.delegate.notify();
        if !failures.is_empty() {
            warn!(
                version,
                failed = failures.len(),
                "listeners failed after a commit by another session"
            );
        }
    }
}

/// An open connection to a store.
///
/// Cloning a session is cheap; clones share the same transaction state and
/// listeners. A session writes through at most one transaction at a time.
/// Other sessions on the same store see each commit and notify their own
/// listeners.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Open a session with the built-in predicate language.
    pub fn open(config: Configuration) -> SessionResult<Session> {
        Self::open_with_compiler(config, Arc::new(DefaultCompiler))
    }

    /// Open a session that compiles predicates with `compiler`.
    pub fn open_with_compiler(
        config: Configuration,
        compiler: Arc<dyn PredicateCompiler>,
    ) -> SessionResult<Session> {
        let store_config = config.store_config()?;
        let handle = Store::open(&store_config).map_err(|e| {
            SessionError::Configuration(format!("cannot open {}: {e}", config.path.display()))
        })?;
        let schema = handle.schema().clone();

        info!(
            path = %config.path.display(),
            types = schema.len(),
            schema_version = %handle.schema_version(),
            "session opened"
        );

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let peer = Arc::new(PeerLink {
                shared: weak.clone(),
            });
            let relay: Weak<PeerLink> = Arc::downgrade(&peer);
            let observer = handle.add_observer(relay);
            Shared {
                config,
                schema,
                store: Mutex::new(Some(handle)),
                txn: Mutex::new(None),
                serial: AtomicU64::new(0),
                delegate: NotificationDelegate::new(weak.clone()),
                defaults: RwLock::new(DefaultsRegistry::new()),
                compiler,
                observer,
                _peer: peer,
            }
        });
        Ok(Session { shared })
    }

    pub fn config(&self) -> &Configuration {
        &self.shared.config
    }

    pub fn path(&self) -> &Path {
        &self.shared.config.path
    }

    /// The bound schema, with every property's column assigned.
    pub fn schema(&self) -> &Schema {
        &self.shared.schema
    }

    pub fn schema_version(&self) -> SessionResult<SchemaVersion> {
        Ok(self.handle()?.schema_version())
    }

    /// The bound schema of `object_type`.
    pub fn object_schema(&self, object_type: &str) -> SessionResult<Arc<ObjectSchema>> {
        self.shared
            .schema
            .get(object_type)
            .cloned()
            .ok_or_else(|| SessionError::UnknownType(object_type.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.shared.store().is_none()
    }

    pub(crate) fn handle(&self) -> SessionResult<StoreHandle> {
        self.shared.store().clone().ok_or(SessionError::SessionClosed)
    }

    pub(crate) fn compiler(&self) -> &dyn PredicateCompiler {
        self.shared.compiler.as_ref()
    }

    pub(crate) fn observe(&self, observer: Weak<dyn ChangeObserver>) {
        self.shared.delegate.add_observer(observer);
    }

    /// Run `f` against the group this session currently reads: its own
    /// pending changes while writing, the last commit otherwise.
    ///
    /// `f` runs under the transaction lock and must not call back into the
    /// session.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Group) -> SessionResult<R>) -> SessionResult<R> {
        let handle = self.handle()?;
        {
            let txn = self.shared.txn();
            if let Some(writing) = txn.as_ref() {
                return f(writing.txn.group());
            }
        }
        f(&handle.read_group())
    }

    /// Run `f` against the pending changes. Fails outside a transaction.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Group) -> SessionResult<R>) -> SessionResult<R> {
        self.handle()?;
        let mut txn = self.shared.txn();
        let writing = txn.as_mut().ok_or(SessionError::NotInTransaction)?;
        f(writing.txn.group_mut())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Start a write transaction.
    ///
    /// The returned scope cancels the transaction if it is dropped before
    /// [`commit`](WriteScope::commit) or [`cancel`](WriteScope::cancel).
    pub fn begin_write(&self) -> SessionResult<WriteScope> {
        let handle = self.handle()?;
        let mut txn = self.shared.txn();
        if txn.is_some() {
            return Err(SessionError::AlreadyInTransaction);
        }
        let write = handle.begin_write()?;
        let serial = self.shared.serial.fetch_add(1, Ordering::Relaxed) + 1;
        *txn = Some(Writing { serial, txn: write });
        debug!(serial, "write transaction started");
        Ok(WriteScope::new(self.clone(), serial))
    }

    pub fn is_in_transaction(&self) -> bool {
        self.shared.txn().is_some()
    }

    /// Commit the current transaction, then notify listeners.
    ///
    /// Session listeners run first, in registration order, followed by live
    /// result views, and finally other sessions on the same store. If any
    /// listener of this session fails the commit still stands and
    /// `ListenerFailed` reports every failure.
    pub fn commit(&self) -> SessionResult<()> {
        self.commit_serial(None)
    }

    /// Discard the current transaction. Listeners are not notified.
    pub fn cancel(&self) -> SessionResult<()> {
        self.cancel_serial(None)
    }

    pub(crate) fn commit_serial(&self, serial: Option<u64>) -> SessionResult<()> {
        let handle = self.handle()?;
        let writing = self.take_txn(serial)?;
        let serial = writing.serial;
        let version = writing.txn.commit()?;
        debug!(serial, version, "write transaction committed");

        let failures = self.shared.delegate.notify();
        handle.notify_observers(Some(self.shared.observer));

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SessionError::ListenerFailed(failures))
        }
    }

    pub(crate) fn cancel_serial(&self, serial: Option<u64>) -> SessionResult<()> {
        self.handle()?;
        let writing = self.take_txn(serial)?;
        debug!(serial = writing.serial, "write transaction cancelled");
        writing.txn.cancel();
        Ok(())
    }

    /// Take the active transaction, if it is the one numbered `serial`.
    fn take_txn(&self, serial: Option<u64>) -> SessionResult<Writing> {
        let mut txn = self.shared.txn();
        match txn.take() {
            Some(writing) if serial.map_or(true, |s| s == writing.serial) => Ok(writing),
            other => {
                *txn = other;
                Err(SessionError::NotInTransaction)
            }
        }
    }

    /// Run `body` inside a write transaction.
    ///
    /// Commits if `body` succeeds. If it fails the transaction is cancelled
    /// and the error is returned as is.
    pub fn run_in_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let scope = self.begin_write()?;
        match body(self) {
            Ok(value) => {
                scope.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(cancel) = scope.cancel() {
                    debug!(error = %cancel, "transaction already closed by body");
                }
                Err(e)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A live view of every object of `object_type`, in table order.
    pub fn objects(&self, object_type: &str) -> SessionResult<ResultView> {
        self.handle()?;
        let schema = self.object_schema(object_type)?;
        Ok(ResultView::live(
            self.clone(),
            schema,
            Query::new(object_type),
            None,
        ))
    }

    /// Shorthand for `objects(object_type)?.filtered(predicate, args)`.
    pub fn objects_where(
        &self,
        object_type: &str,
        predicate: &str,
        args: &[Value],
    ) -> SessionResult<ResultView> {
        self.objects(object_type)?.filtered(predicate, args)
    }

    /// The object of `object_type` with `key`, if it exists.
    pub fn object(&self, object_type: &str, key: ObjectKey) -> SessionResult<Option<Object>> {
        let schema = self.object_schema(object_type)?;
        let exists = self.read(|group| {
            Ok(group
                .table(object_type)
                .is_some_and(|table| table.contains(key)))
        })?;
        Ok(exists.then(|| Object::new(self.clone(), schema, key)))
    }

    /// The object of `object_type` whose primary key equals `value`.
    pub fn object_for_primary_key(
        &self,
        object_type: &str,
        value: impl Into<Value>,
    ) -> SessionResult<Option<Object>> {
        let schema = self.object_schema(object_type)?;
        let pk = schema
            .primary_key_property()
            .ok_or_else(|| SessionError::UnknownProperty {
                object_type: object_type.to_string(),
                property: "primary key".to_string(),
            })?;
        let value = crate::object::coerce_value(&schema, pk, value.into())?;
        let column = pk.column;
        let key = self.read(|group| {
            Ok(group
                .table(object_type)
                .and_then(|table| table.find_first(column, &value)))
        })?;
        Ok(key.map(|key| Object::new(self.clone(), schema, key)))
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Register `listener` for `kind`, which must be `"change"`. Returns
    /// `false` if the listener was already registered.
    pub fn add_listener(&self, kind: &str, listener: Arc<SessionListener>) -> SessionResult<bool> {
        self.handle()?;
        Ok(self.shared.delegate.add_listener(kind, listener)?)
    }

    /// Unregister `listener`. Returns `false` if it was not registered.
    pub fn remove_listener(&self, kind: &str, listener: &Arc<SessionListener>) -> SessionResult<bool> {
        Ok(self.shared.delegate.remove_listener(kind, listener)?)
    }

    /// Unregister every listener. Returns how many were removed.
    pub fn remove_all_listeners(&self) -> SessionResult<usize> {
        Ok(self.shared.delegate.remove_all_listeners(None)?)
    }

    pub fn listener_count(&self) -> usize {
        self.shared.delegate.listener_count()
    }

    // -----------------------------------------------------------------------
    // Defaults
    // -----------------------------------------------------------------------

    /// Compute creation defaults for `object_type` with `factory`. Replaces
    /// any earlier factory for the type.
    pub fn register_factory(&self, object_type: &str, factory: ObjectFactory) -> SessionResult<()> {
        self.object_schema(object_type)?;
        self.shared
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(object_type, factory);
        Ok(())
    }

    pub fn unregister_factory(&self, object_type: &str) -> bool {
        self.shared
            .defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister(object_type)
    }

    /// Defaults for one creation. Factories run outside the registry lock.
    pub(crate) fn defaults_for(&self, schema: &ObjectSchema) -> ObjectDefaults {
        let registry = self
            .shared
            .defaults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        registry.defaults_for(schema)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Release the store handle. Any open transaction is cancelled, every
    /// later operation fails with `SessionClosed`, and no further
    /// notifications are delivered. Closing twice is a no-op.
    pub fn close(&self) {
        let Some(handle) = self.shared.store().take() else {
            return;
        };
        if let Some(writing) = self.shared.txn().take() {
            warn!(serial = writing.serial, "session closed during a write transaction; cancelling");
            writing.txn.cancel();
        }
        handle.remove_observer(self.shared.observer);
        info!(path = %self.shared.config.path.display(), "session closed");
        handle.close();
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Session {}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.shared.config.path)
            .field("closed", &self.is_closed())
            .field("in_transaction", &self.is_in_transaction())
            .field("delegate", &self.shared.delegate)
            .finish()
    }
}
