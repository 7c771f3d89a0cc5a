use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};
use vista_schema::Schema;
use vista_types::{ObjectKey, SchemaVersion};

use crate::error::{StoreError, StoreResult};
use crate::file;
use crate::group::Group;

/// How to open a store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Schema to bind. `None` uses the stored schema.
    pub schema: Option<Schema>,
    pub schema_version: SchemaVersion,
    /// Keep everything in memory; `path` only names the store.
    pub in_memory: bool,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: None,
            schema_version: SchemaVersion::default(),
            in_memory: false,
        }
    }

    pub fn with_schema(mut self, schema: Schema, version: SchemaVersion) -> Self {
        self.schema = Some(schema);
        self.schema_version = version;
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }
}

/// Receives a signal after another handle commits to a shared store.
pub trait CommitObserver: Send + Sync {
    fn on_commit(&self, version: u64);
}

/// Identifies a registered [`CommitObserver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Open stores in this process, by path. Entries whose store has been
/// dropped are pruned on the next open.
static REGISTRY: Lazy<Mutex<HashMap<PathBuf, Weak<Store>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One open store, shared by every handle opened on its path.
pub struct Store {
    path: PathBuf,
    in_memory: bool,
    schema: Schema,
    committed: RwLock<Arc<Group>>,
    version: AtomicU64,
    writer: AtomicBool,
    /// Key counters reached by cancelled transactions. Keys handed out
    /// once are never handed out again, committed or not.
    key_marks: Mutex<HashMap<String, ObjectKey>>,
    observers: Mutex<Vec<(ObserverId, Weak<dyn CommitObserver>)>>,
    next_observer: AtomicU64,
}

impl Store {
    /// Open the store at `config.path`, attaching to it if it is already
    /// open in this process.
    pub fn open(config: &StoreConfig) -> StoreResult<StoreHandle> {
        let key = registry_key(&config.path)?;
        let mut registry = lock(&REGISTRY);
        registry.retain(|_, store| store.strong_count() > 0);

        if let Some(store) = registry.get(&key).and_then(Weak::upgrade) {
            store.check_attach(config)?;
            debug!(path = %key.display(), "attached to open store");
            return Ok(StoreHandle { store });
        }

        let store = Arc::new(Self::load(key.clone(), config)?);
        registry.insert(key, Arc::downgrade(&store));
        Ok(StoreHandle { store })
    }

    fn load(path: PathBuf, config: &StoreConfig) -> StoreResult<Self> {
        let existing = if config.in_memory {
            None
        } else {
            file::load(&path)?
        };
        let created = existing.is_none();
        let mut group = existing.unwrap_or_default();
        let before = group.schema_version();
        let schema = group.bind(config.schema.as_ref(), config.schema_version)?;

        if !config.in_memory && (created || group.schema_version() != before) {
            file::save(&path, &group)?;
        }

        info!(
            path = %path.display(),
            in_memory = config.in_memory,
            created,
            schema_version = %group.schema_version(),
            types = schema.len(),
            "opened store"
        );

        Ok(Self {
            path,
            in_memory: config.in_memory,
            schema,
            committed: RwLock::new(Arc::new(group)),
            version: AtomicU64::new(0),
            writer: AtomicBool::new(false),
            key_marks: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(0),
        })
    }

    fn check_attach(&self, config: &StoreConfig) -> StoreResult<()> {
        let Some(schema) = &config.schema else {
            return Ok(());
        };
        let open = self.read_group().schema_version();
        if open != config.schema_version {
            return Err(StoreError::AlreadyOpenWithVersion {
                open,
                requested: config.schema_version,
            });
        }
        if !self.schema.same_shape(schema) {
            return Err(StoreError::SchemaChangedWithoutVersion(open));
        }
        Ok(())
    }

    fn read_group(&self) -> Arc<Group> {
        Arc::clone(&self.committed.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("in_memory", &self.in_memory)
            .field("version", &self.version.load(Ordering::Acquire))
            .finish()
    }
}

fn registry_key(path: &Path) -> StoreResult<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Returns `true` if a store at `path` is currently open in this process.
pub fn is_open(path: &Path) -> bool {
    let Ok(key) = registry_key(path) else {
        return false;
    };
    lock(&REGISTRY)
        .get(&key)
        .is_some_and(|store| store.strong_count() > 0)
}

/// A reference to an open store. Cloning is cheap; the store stays open
/// while any handle exists.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    store: Arc<Store>,
}

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.store.path
    }

    pub fn is_in_memory(&self) -> bool {
        self.store.in_memory
    }

    /// The schema bound at open, with columns assigned.
    pub fn schema(&self) -> &Schema {
        &self.store.schema
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.read_group().schema_version()
    }

    /// Number of commits since the store was opened in this process.
    pub fn version(&self) -> u64 {
        self.store.version.load(Ordering::Acquire)
    }

    /// The last committed group.
    pub fn read_group(&self) -> Arc<Group> {
        self.store.read_group()
    }

    /// Start a write transaction on a private copy of the committed group.
    ///
    /// Fails with `WriterBusy` if any handle on this store is writing.
    pub fn begin_write(&self) -> StoreResult<WriteTransaction> {
        if self
            .store
            .writer
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(StoreError::WriterBusy(self.store.path.clone()));
        }
        let mut group = Group::clone(&self.read_group());
        group.reserve_keys(&lock(&self.store.key_marks));
        debug!(path = %self.store.path.display(), "write transaction started");
        Ok(WriteTransaction {
            store: Arc::clone(&self.store),
            group,
            active: true,
        })
    }

    /// Register an observer for commits made through other handles.
    pub fn add_observer(&self, observer: Weak<dyn CommitObserver>) -> ObserverId {
        let id = ObserverId(self.store.next_observer.fetch_add(1, Ordering::Relaxed));
        lock(&self.store.observers).push((id, observer));
        id
    }

    pub fn remove_observer(&self, id: ObserverId) {
        lock(&self.store.observers).retain(|(oid, _)| *oid != id);
    }

    /// Signal every live observer except `skip`. Dead observers are pruned.
    pub fn notify_observers(&self, skip: Option<ObserverId>) {
        let targets: Vec<Arc<dyn CommitObserver>> = {
            let mut observers = lock(&self.store.observers);
            observers.retain(|(_, o)| o.strong_count() > 0);
            observers
                .iter()
                .filter(|(id, _)| Some(*id) != skip)
                .filter_map(|(_, o)| o.upgrade())
                .collect()
        };
        let version = self.version();
        for observer in targets {
            observer.on_commit(version);
        }
    }

    /// Release this handle.
    pub fn close(self) {
        debug!(
            path = %self.store.path.display(),
            remaining = Arc::strong_count(&self.store) - 1,
            "store handle closed"
        );
    }
}

/// A pending set of changes. Commit swaps them in atomically; dropping an
/// uncommitted transaction discards them.
pub struct WriteTransaction {
    store: Arc<Store>,
    group: Group,
    active: bool,
}

impl WriteTransaction {
    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    /// Persist (for file-backed stores) and publish the changes. Returns the
    /// new commit version.
    ///
    /// On error nothing is published and the write lock is released.
    pub fn commit(mut self) -> StoreResult<u64> {
        self.active = false;
        let store = Arc::clone(&self.store);
        let result = Self::publish(&store, std::mem::take(&mut self.group));
        store.writer.store(false, Ordering::Release);
        result
    }

    fn publish(store: &Store, group: Group) -> StoreResult<u64> {
        if !store.in_memory {
            file::save(&store.path, &group)?;
        }
        *store
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(group);
        let version = store.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(path = %store.path.display(), version, "write transaction committed");
        Ok(version)
    }

    /// Discard the changes.
    pub fn cancel(mut self) {
        self.release();
        debug!(path = %self.store.path.display(), "write transaction cancelled");
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            let mut marks = lock(&self.store.key_marks);
            for (name, key) in self.group.key_marks() {
                let mark = marks.entry(name.to_string()).or_insert(key);
                *mark = (*mark).max(key);
            }
            drop(marks);
            self.store.writer.store(false, Ordering::Release);
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if self.active {
            warn!(path = %self.store.path.display(), "write transaction dropped without commit");
            self.release();
        }
    }
}

impl fmt::Debug for WriteTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("path", &self.store.path)
            .field("active", &self.active)
            .finish()
    }
}
