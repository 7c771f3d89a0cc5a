use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use vista_schema::{ObjectSchema, Schema};
use vista_store::StoreConfig;
use vista_types::SchemaVersion;

use crate::error::{SessionError, SessionResult};

/// Length in bytes of an encryption key.
pub const ENCRYPTION_KEY_LEN: usize = 64;

const INITIAL_DEFAULT_PATH: &str = "default.vista";

static DEFAULT_PATH: Lazy<RwLock<PathBuf>> =
    Lazy::new(|| RwLock::new(PathBuf::from(INITIAL_DEFAULT_PATH)));

/// How to open a [`Session`](crate::Session).
///
/// A configuration is fixed once a session is open. Opening a path that is
/// already open in this process attaches to the same store; a path that
/// exists on disk is loaded, otherwise it is created.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    pub path: PathBuf,
    /// Object types to bind. `None` uses the schema stored at `path`.
    pub schema: Option<Vec<ObjectSchema>>,
    /// Must not decrease across opens of the same store.
    pub schema_version: SchemaVersion,
    /// Checked for length at open; stores are not encrypted.
    pub encryption_key: Option<Vec<u8>>,
    /// Keep the store in memory. `path` then only identifies it within the
    /// process.
    pub in_memory: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl Configuration {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema: None,
            schema_version: SchemaVersion::new(0),
            encryption_key: None,
            in_memory: false,
        }
    }

    /// The path [`Configuration::default`] uses.
    pub fn default_path() -> PathBuf {
        DEFAULT_PATH
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the process-wide default path.
    pub fn set_default_path(path: impl Into<PathBuf>) {
        *DEFAULT_PATH.write().unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_schema(mut self, types: Vec<ObjectSchema>) -> Self {
        self.schema = Some(types);
        self
    }

    pub fn with_schema_version(mut self, version: impl Into<SchemaVersion>) -> Self {
        self.schema_version = version.into();
        self
    }

    pub fn with_encryption_key(mut self, key: Vec<u8>) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and translate into the store's configuration.
    pub(crate) fn store_config(&self) -> SessionResult<StoreConfig> {
        if self.path.as_os_str().is_empty() {
            return Err(SessionError::Configuration("path is empty".into()));
        }
        if let Some(key) = &self.encryption_key {
            if key.len() != ENCRYPTION_KEY_LEN {
                return Err(SessionError::Configuration(format!(
                    "encryption key must be {ENCRYPTION_KEY_LEN} bytes, got {}",
                    key.len()
                )));
            }
        }
        if self.schema_version.is_unversioned() {
            return Err(SessionError::Configuration(
                "schema version must not be the unversioned sentinel".into(),
            ));
        }

        let mut config = StoreConfig::new(&self.path);
        if let Some(types) = &self.schema {
            config = config.with_schema(Schema::new(types.clone())?, self.schema_version);
        }
        if self.in_memory {
            config = config.in_memory();
        }
        Ok(config)
    }
}
