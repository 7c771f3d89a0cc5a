use std::fmt;

/// Errors from listener registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Only `"change"` notifications exist.
    #[error("unsupported notification kind: {0:?}")]
    UnsupportedKind(String),
}

/// Result alias for notification operations.
pub type NotifyResult<T> = Result<T, NotifyError>;

/// What a listener returns when it fails.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Which listener set a failed listener belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerOrigin {
    /// A listener registered on the notifier itself.
    Owner,
    /// A listener registered on an observer, such as a result view over
    /// the named object type.
    Observer(String),
}

impl fmt::Display for ListenerOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Owner => f.write_str("change listener"),
            Self::Observer(name) => write!(f, "{name} view listener"),
        }
    }
}

/// A listener failure recorded during a dispatch pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{origin} {index} failed: {message}")]
pub struct ListenerFailure {
    pub origin: ListenerOrigin,
    /// Position of the listener within its own set.
    pub index: usize,
    pub message: String,
}

impl ListenerFailure {
    pub fn new(origin: ListenerOrigin, index: usize, error: &ListenerError) -> Self {
        Self {
            origin,
            index,
            message: error.to_string(),
        }
    }
}
