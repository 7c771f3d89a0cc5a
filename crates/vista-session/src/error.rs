use std::fmt;

use vista_notify::{ListenerFailure, NotifyError};
use vista_query::QueryError;
use vista_schema::SchemaError;
use vista_store::StoreError;
use vista_types::ObjectKey;

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session could not be opened as configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A mutation was attempted outside a write transaction.
    #[error("not in a write transaction")]
    NotInTransaction,

    /// This session already has an open write transaction.
    #[error("a write transaction is already in progress")]
    AlreadyInTransaction,

    /// The schema has no object type with this name.
    #[error("unknown object type: {0}")]
    UnknownType(String),

    /// The object type has no property with this name.
    #[error("{object_type} has no property {property}")]
    UnknownProperty {
        object_type: String,
        property: String,
    },

    /// The predicate failed to parse or to resolve against the schema.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A view index at or past the view's length.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The view's session is closed or its table is gone.
    #[error("result view is no longer valid")]
    StaleView,

    /// The session was closed before the call.
    #[error("session is closed")]
    SessionClosed,

    /// Only `"change"` notifications exist.
    #[error("unsupported notification kind: {0:?}")]
    UnsupportedNotificationKind(String),

    /// A value does not fit the property's declared type.
    #[error("{object_type}.{property}: {reason}")]
    TypeMismatch {
        object_type: String,
        property: String,
        reason: String,
    },

    /// A required property has neither a supplied value nor a default.
    #[error("{object_type}.{property} is required")]
    MissingProperty {
        object_type: String,
        property: String,
    },

    /// A create without update collided with an existing primary key.
    #[error("{object_type} with primary key {value} already exists")]
    DuplicatePrimaryKey { object_type: String, value: String },

    /// A link value names an object that does not exist in the target table.
    #[error("{object_type}.{property} links to missing object {target}")]
    DanglingLink {
        object_type: String,
        property: String,
        target: ObjectKey,
    },

    /// The object's row has been deleted.
    #[error("{0} object has been deleted")]
    DeletedObject(String),

    /// The commit succeeded but listeners failed during dispatch.
    #[error("{} listener(s) failed after commit: {}", .0.len(), join(.0))]
    ListenerFailed(Vec<ListenerFailure>),

    /// The supplied schema is not valid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The underlying store failed.
    #[error(transparent)]
    Store(StoreError),
}

/// Stable, machine-checkable classification of a [`SessionError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad configuration, an invalid schema, or a version conflict at open.
    Configuration,
    /// [`SessionError::NotInTransaction`].
    NotInTransaction,
    /// [`SessionError::AlreadyInTransaction`].
    AlreadyInTransaction,
    /// [`SessionError::UnknownType`].
    UnknownType,
    /// [`SessionError::UnknownProperty`].
    UnknownProperty,
    /// [`SessionError::InvalidPredicate`].
    InvalidPredicate,
    /// [`SessionError::IndexOutOfRange`].
    IndexOutOfRange,
    /// [`SessionError::StaleView`].
    StaleView,
    /// [`SessionError::SessionClosed`].
    SessionClosed,
    /// [`SessionError::UnsupportedNotificationKind`].
    UnsupportedNotificationKind,
    /// [`SessionError::TypeMismatch`].
    TypeMismatch,
    /// [`SessionError::MissingProperty`].
    MissingProperty,
    /// [`SessionError::DuplicatePrimaryKey`].
    DuplicatePrimaryKey,
    /// [`SessionError::DanglingLink`].
    DanglingLink,
    /// [`SessionError::DeletedObject`].
    DeletedObject,
    /// [`SessionError::ListenerFailed`].
    ListenerFailed,
    /// Another session is writing to the same store.
    WriterBusy,
    /// Any other store failure: I/O, corruption, encoding.
    Storage,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) | Self::Schema(_) => ErrorKind::Configuration,
            Self::NotInTransaction => ErrorKind::NotInTransaction,
            Self::AlreadyInTransaction => ErrorKind::AlreadyInTransaction,
            Self::UnknownType(_) => ErrorKind::UnknownType,
            Self::UnknownProperty { .. } => ErrorKind::UnknownProperty,
            Self::InvalidPredicate(_) => ErrorKind::InvalidPredicate,
            Self::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Self::StaleView => ErrorKind::StaleView,
            Self::SessionClosed => ErrorKind::SessionClosed,
            Self::UnsupportedNotificationKind(_) => ErrorKind::UnsupportedNotificationKind,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::MissingProperty { .. } => ErrorKind::MissingProperty,
            Self::DuplicatePrimaryKey { .. } => ErrorKind::DuplicatePrimaryKey,
            Self::DanglingLink { .. } => ErrorKind::DanglingLink,
            Self::DeletedObject(_) => ErrorKind::DeletedObject,
            Self::ListenerFailed(_) => ErrorKind::ListenerFailed,
            Self::Store(StoreError::WriterBusy(_)) => ErrorKind::WriterBusy,
            Self::Store(e) if e.is_configuration() => ErrorKind::Configuration,
            Self::Store(_) => ErrorKind::Storage,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NoSuchTable(name) => Self::UnknownType(name),
            StoreError::NoSuchProperty { table, property } => Self::UnknownProperty {
                object_type: table,
                property,
            },
            StoreError::DuplicatePrimaryKey { table, value } => Self::DuplicatePrimaryKey {
                object_type: table,
                value,
            },
            other => Self::Store(other),
        }
    }
}

impl From<QueryError> for SessionError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::InvalidPredicate(reason) => Self::InvalidPredicate(reason),
            QueryError::UnknownProperty {
                object_type,
                property,
            } => Self::UnknownProperty {
                object_type,
                property,
            },
            QueryError::UnknownType(name) => Self::UnknownType(name),
        }
    }
}

impl From<NotifyError> for SessionError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::UnsupportedKind(kind) => Self::UnsupportedNotificationKind(kind),
        }
    }
}

fn join(failures: &[ListenerFailure]) -> impl fmt::Display + '_ {
    struct Join<'a>(&'a [ListenerFailure]);
    impl fmt::Display for Join<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, failure) in self.0.iter().enumerate() {
                if i > 0 {
                    f.write_str("; ")?;
                }
                write!(f, "{failure}")?;
            }
            Ok(())
        }
    }
    Join(failures)
}

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
