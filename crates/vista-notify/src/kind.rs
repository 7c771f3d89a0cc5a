use std::fmt;
use std::str::FromStr;

use crate::error::NotifyError;

/// The kinds of notification a listener can register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A write transaction committed.
    Change,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Change => "change",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change" => Ok(Self::Change),
            other => Err(NotifyError::UnsupportedKind(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
