//! Result views: live or frozen projections of a query over one table.
//!
//! A live view holds only its query and sort. Every access re-evaluates them
//! against the session's current group, so the view is never out of date and
//! never caches. A snapshot captures the ordered keys once and maps indices to
//! those keys for its whole life.
//!
//! View listeners are driven by the session's notification delegate: after
//! each commit a watched view re-evaluates, diffs the new key sequence
//! against the previous one and calls its listeners only if they differ.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};
use vista_notify::{ChangeObserver, ListenerError, ListenerFailure, ListenerOrigin, ListenerSet};
use vista_query::{diff_keys, Query, SortDescriptor, ViewChange};
use vista_schema::ObjectSchema;
use vista_store::{Group, Table};
use vista_types::{ObjectKey, Value};

use crate::error::{SessionError, SessionResult};
use crate::object::Object;
use crate::session::Session;

/// A view-level listener. Called with the view and how its key sequence
/// changed.
pub type ViewListener =
    dyn Fn(&ResultView, &ViewChange) -> Result<(), ListenerError> + Send + Sync;

/// Sort criteria for [`ResultView::sorted`]: `(property, ascending)` pairs,
/// most significant first. Property names may be dotted link paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, bool)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a less significant key.
    pub fn then(mut self, property: impl Into<String>, ascending: bool) -> Self {
        self.keys.push((property.into(), ascending));
        self
    }

    pub fn keys(&self) -> &[(String, bool)] {
        &self.keys
    }

    /// The same keys with every direction flipped.
    pub fn reversed(&self) -> Self {
        Self {
            keys: self.keys.iter().map(|(k, asc)| (k.clone(), !asc)).collect(),
        }
    }
}

impl From<&str> for SortSpec {
    fn from(property: &str) -> Self {
        Self::new().then(property, true)
    }
}

impl From<String> for SortSpec {
    fn from(property: String) -> Self {
        Self::new().then(property, true)
    }
}

impl<S: Into<String>> From<(S, bool)> for SortSpec {
    fn from((property, ascending): (S, bool)) -> Self {
        Self::new().then(property, ascending)
    }
}

impl<S: Into<String>> From<Vec<(S, bool)>> for SortSpec {
    fn from(keys: Vec<(S, bool)>) -> Self {
        keys.into_iter()
            .fold(Self::new(), |spec, (k, asc)| spec.then(k, asc))
    }
}

impl<S: Into<String>, const N: usize> From<[(S, bool); N]> for SortSpec {
    fn from(keys: [(S, bool); N]) -> Self {
        keys.into_iter()
            .fold(Self::new(), |spec, (k, asc)| spec.then(k, asc))
    }
}

#[derive(Clone, Debug)]
enum Mode {
    Live,
    Snapshot(Arc<Vec<ObjectKey>>),
}

struct ViewCore {
    this: Weak<ViewCore>,
    session: Session,
    schema: Arc<ObjectSchema>,
    query: Query,
    sort: Option<SortDescriptor>,
    mode: Mode,
    listeners: ListenerSet<ViewListener>,
    last: Mutex<Option<Vec<ObjectKey>>>,
    watching: AtomicBool,
}

impl ViewCore {
    fn last(&self) -> MutexGuard<'_, Option<Vec<ObjectKey>>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An ordered projection of a query, plus an optional sort, over one
/// object type.
///
/// Views are immutable: [`filtered`](Self::filtered),
/// [`sorted`](Self::sorted) and [`snapshot`](Self::snapshot) return new
/// views. Clones share listeners.
#[derive(Clone)]
pub struct ResultView {
    core: Arc<ViewCore>,
}

impl ResultView {
    pub(crate) fn live(
        session: Session,
        schema: Arc<ObjectSchema>,
        query: Query,
        sort: Option<SortDescriptor>,
    ) -> Self {
        Self::build(session, schema, query, sort, Mode::Live)
    }

    fn build(
        session: Session,
        schema: Arc<ObjectSchema>,
        query: Query,
        sort: Option<SortDescriptor>,
        mode: Mode,
    ) -> Self {
        let core = Arc::new_cyclic(|this| ViewCore {
            this: this.clone(),
            session,
            schema,
            query,
            sort,
            mode,
            listeners: ListenerSet::new(),
            last: Mutex::new(None),
            watching: AtomicBool::new(false),
        });
        Self { core }
    }

    pub fn object_type(&self) -> &str {
        &self.core.schema.name
    }

    pub fn object_schema(&self) -> &Arc<ObjectSchema> {
        &self.core.schema
    }

    pub fn session(&self) -> &Session {
        &self.core.session
    }

    pub fn query(&self) -> &Query {
        &self.core.query
    }

    pub fn sort(&self) -> Option<&SortDescriptor> {
        self.core.sort.as_ref()
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.core.mode, Mode::Snapshot(_))
    }

    /// Returns `false` once the session is closed or the view's table no
    /// longer exists.
    pub fn is_valid(&self) -> bool {
        self.core
            .session
            .read(|group| Ok(group.table(self.object_type()).is_some()))
            .unwrap_or(false)
    }

    /// Run `f` against the view's table. Fails with `StaleView` if the view
    /// is not valid.
    fn with_table<R>(&self, f: impl FnOnce(&Group, &Table) -> SessionResult<R>) -> SessionResult<R> {
        self.core
            .session
            .read(|group| {
                let table = group
                    .table(self.object_type())
                    .ok_or(SessionError::StaleView)?;
                f(group, table)
            })
            .map_err(|e| match e {
                SessionError::SessionClosed => SessionError::StaleView,
                other => other,
            })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    /// Number of objects in the view. Live views re-evaluate their query;
    /// snapshots report the captured count, deleted objects included.
    pub fn len(&self) -> SessionResult<usize> {
        self.with_table(|group, _| match &self.core.mode {
            Mode::Live => Ok(self.core.query.count(group)?),
            Mode::Snapshot(keys) => Ok(keys.len()),
        })
    }

    pub fn is_empty(&self) -> SessionResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The object at `index`.
    ///
    /// Fails with `IndexOutOfRange` if `index >= len()`. A snapshot returns
    /// `None` where the captured object has since been deleted.
    pub fn get(&self, index: usize) -> SessionResult<Option<Object>> {
        let key = self.with_table(|group, table| match &self.core.mode {
            Mode::Live => {
                let keys = self.core.query.evaluate(group, self.core.sort.as_ref())?;
                keys.get(index)
                    .copied()
                    .map(Some)
                    .ok_or(SessionError::IndexOutOfRange {
                        index,
                        len: keys.len(),
                    })
            }
            Mode::Snapshot(keys) => {
                let key = *keys.get(index).ok_or(SessionError::IndexOutOfRange {
                    index,
                    len: keys.len(),
                })?;
                Ok(table.contains(key).then_some(key))
            }
        })?;
        Ok(key.map(|key| self.object(key)))
    }

    pub fn first(&self) -> SessionResult<Option<Object>> {
        Ok(self.to_vec()?.into_iter().next())
    }

    /// Keys of the objects currently in the view, in view order. For a
    /// snapshot, deleted objects are skipped.
    pub fn keys(&self) -> SessionResult<Vec<ObjectKey>> {
        self.with_table(|group, table| match &self.core.mode {
            Mode::Live => Ok(self.core.query.evaluate(group, self.core.sort.as_ref())?),
            Mode::Snapshot(keys) => Ok(keys.iter().copied().filter(|k| table.contains(*k)).collect()),
        })
    }

    pub fn to_vec(&self) -> SessionResult<Vec<Object>> {
        Ok(self.keys()?.into_iter().map(|k| self.object(k)).collect())
    }

    /// Iterate over the objects in the view as of this call. Later writes do
    /// not affect the iteration, so deleting while iterating is safe.
    pub fn iter(&self) -> SessionResult<std::vec::IntoIter<Object>> {
        Ok(self.to_vec()?.into_iter())
    }

    fn object(&self, key: ObjectKey) -> Object {
        Object::new(self.core.session.clone(), Arc::clone(&self.core.schema), key)
    }

    // -----------------------------------------------------------------------
    // Derivation
    // -----------------------------------------------------------------------

    /// A live view of the objects in this view that also match `predicate`.
    ///
    /// `$0..$n` in the predicate refer to `args`. Deriving from a snapshot
    /// yields a live view over the snapshot's query.
    pub fn filtered(&self, predicate: &str, args: &[Value]) -> SessionResult<ResultView> {
        if !self.is_valid() {
            return Err(SessionError::StaleView);
        }
        let session = &self.core.session;
        let filter = session
            .compiler()
            .compile(predicate, args, &self.core.schema, session.schema())?;
        debug!(object_type = %self.object_type(), predicate, "filtered view");
        Ok(Self::live(
            session.clone(),
            Arc::clone(&self.core.schema),
            self.core.query.and(filter),
            self.core.sort.clone(),
        ))
    }

    /// A live view with the same filter, ordered by `spec`. Replaces any
    /// earlier sort.
    pub fn sorted(&self, spec: impl Into<SortSpec>) -> SessionResult<ResultView> {
        if !self.is_valid() {
            return Err(SessionError::StaleView);
        }
        let spec = spec.into();
        let session = &self.core.session;
        let sort = SortDescriptor::resolve(spec.keys(), &self.core.schema, session.schema())?;
        debug!(object_type = %self.object_type(), keys = spec.keys().len(), "sorted view");
        Ok(Self::live(
            session.clone(),
            Arc::clone(&self.core.schema),
            self.core.query.clone(),
            Some(sort),
        ))
    }

    /// Freeze the current key sequence.
    pub fn snapshot(&self) -> SessionResult<ResultView> {
        let keys = self.keys()?;
        debug!(object_type = %self.object_type(), len = keys.len(), "snapshot taken");
        Ok(Self::build(
            self.core.session.clone(),
            Arc::clone(&self.core.schema),
            self.core.query.clone(),
            self.core.sort.clone(),
            Mode::Snapshot(Arc::new(keys)),
        ))
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Call `listener` after each commit that changes this view's membership
    /// or order. Returns `false` if it was already registered.
    ///
    /// The view stops being watched once every clone of it is dropped.
    pub fn add_listener(&self, listener: Arc<ViewListener>) -> SessionResult<bool> {
        let baseline = self.keys()?;
        let was_empty = self.core.listeners.is_empty();
        let added = self.core.listeners.add(listener);
        if was_empty && added {
            *self.core.last() = Some(baseline);
        }
        if !self.core.watching.swap(true, Ordering::AcqRel) {
            let observer: Weak<dyn ChangeObserver> = self.core.this.clone();
            self.core.session.observe(observer);
        }
        Ok(added)
    }

    pub fn remove_listener(&self, listener: &Arc<ViewListener>) -> bool {
        self.core.listeners.remove(listener)
    }

    pub fn remove_all_listeners(&self) -> usize {
        self.core.listeners.clear()
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.len()
    }
}

impl ChangeObserver for ViewCore {
    fn on_change(&self) -> Vec<ListenerFailure> {
        if self.listeners.is_empty() {
            return Vec::new();
        }
        let Some(core) = self.this.upgrade() else {
            return Vec::new();
        };
        let view = ResultView { core };
        let current = match view.keys() {
            Ok(keys) => keys,
            Err(e) => {
                debug!(object_type = %view.object_type(), error = %e, "view not re-evaluated");
                return Vec::new();
            }
        };
        let change = {
            let mut last = self.last();
            let previous = last.replace(current.clone()).unwrap_or_default();
            diff_keys(&previous, &current)
        };
        if change.is_empty() {
            return Vec::new();
        }

        debug!(
            object_type = %view.object_type(),
            insertions = change.insertions.len(),
            deletions = change.deletions.len(),
            moved = change.moved.len(),
            "view changed"
        );
        let mut failures = Vec::new();
        for (index, listener) in self.listeners.snapshot().iter().enumerate() {
            if let Err(e) = listener(&view, &change) {
                warn!(object_type = %view.object_type(), index, error = %e, "view listener failed");
                failures.push(ListenerFailure::new(
                    ListenerOrigin::Observer(view.object_type().to_string()),
                    index,
                    &e,
                ));
            }
        }
        failures
    }
}

impl fmt::Debug for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultView")
            .field("type", &self.core.schema.name)
            .field("filter", self.core.query.filter())
            .field("sort", &self.core.sort)
            .field("snapshot", &self.is_snapshot())
            .field("listeners", &self.core.listeners.len())
            .finish()
    }
}
