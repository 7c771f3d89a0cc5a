use std::path::PathBuf;

use vista_schema::SchemaError;
use vista_types::{ColumnId, ObjectKey, SchemaVersion};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The file exists but is not a readable store.
    #[error("corrupt store file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The file was written by an incompatible format revision.
    #[error("unsupported store format version {0}")]
    UnsupportedFormat(u16),

    /// Another session holds the store's write lock.
    #[error("store {0} already has an active write transaction")]
    WriterBusy(PathBuf),

    /// The requested schema version is lower than the stored one.
    #[error("schema version {requested} is lower than the stored version {stored}")]
    SchemaVersionRegressed {
        stored: SchemaVersion,
        requested: SchemaVersion,
    },

    /// The schema changed but the version did not.
    #[error("schema differs from the stored schema at version {0}; bump the schema version")]
    SchemaChangedWithoutVersion(SchemaVersion),

    /// The path is already open in this process with another schema version.
    #[error("store already opened with schema version {open}, requested {requested}")]
    AlreadyOpenWithVersion {
        open: SchemaVersion,
        requested: SchemaVersion,
    },

    /// The supplied schema is not valid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The group has no table for this object type.
    #[error("no table for object type {0}")]
    NoSuchTable(String),

    /// No live row carries this key.
    #[error("no object {key} in table {table}")]
    NoSuchObject { table: String, key: ObjectKey },

    /// The table's schema has no property with this name.
    #[error("no property {property} in table {table}")]
    NoSuchProperty { table: String, property: String },

    /// The column index is past the table's last column.
    #[error("no column {column} in table {table}")]
    NoSuchColumn { table: String, column: ColumnId },

    /// A row was supplied with the wrong number of slots.
    #[error("table {table} expects {expected} values, got {found}")]
    Arity {
        table: String,
        expected: usize,
        found: usize,
    },

    /// A primary key value occurs more than once.
    #[error("duplicate primary key {value} in table {table}")]
    DuplicatePrimaryKey { table: String, value: String },
}

impl StoreError {
    /// Returns `true` for errors caused by how the store was opened rather
    /// than by what was done with it.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::SchemaVersionRegressed { .. }
                | Self::SchemaChangedWithoutVersion(_)
                | Self::AlreadyOpenWithVersion { .. }
                | Self::Schema(_)
        )
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
