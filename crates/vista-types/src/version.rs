use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonic schema version of a store.
///
/// A store that has never been bound to a schema reports
/// [`SchemaVersion::UNVERSIONED`]. Every other value is a version the caller
/// chose; opening with a lower version than the stored one is an error.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u64);

impl SchemaVersion {
    /// Sentinel for a store that has not been created yet.
    pub const UNVERSIONED: SchemaVersion = SchemaVersion(u64::MAX);

    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_unversioned(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns `true` if a store at `self` may be opened with `requested`.
    ///
    /// Unversioned stores accept any version; otherwise the version may only
    /// stay the same or grow.
    pub const fn accepts(self, requested: SchemaVersion) -> bool {
        self.is_unversioned() || requested.0 >= self.0
    }
}

impl From<u64> for SchemaVersion {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Debug for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            write!(f, "SchemaVersion(unversioned)")
        } else {
            write!(f, "SchemaVersion({})", self.0)
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unversioned() {
            write!(f, "unversioned")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unversioned_accepts_anything() {
        assert!(SchemaVersion::UNVERSIONED.accepts(SchemaVersion::new(0)));
        assert!(SchemaVersion::UNVERSIONED.accepts(SchemaVersion::new(9)));
    }

    #[test]
    fn versions_only_grow() {
        let v = SchemaVersion::new(2);
        assert!(v.accepts(SchemaVersion::new(2)));
        assert!(v.accepts(SchemaVersion::new(3)));
        assert!(!v.accepts(SchemaVersion::new(1)));
    }

    #[test]
    fn display() {
        assert_eq!(SchemaVersion::UNVERSIONED.to_string(), "unversioned");
        assert_eq!(SchemaVersion::default().to_string(), "0");
    }
}
