//! Strongly-typed identifiers for rows and columns.
//!
//! Rows and columns are addressed by identity, never by position: a row's
//! position in its table changes when other rows are removed, and a column's
//! position changes when the schema migrates. Keys never do.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! new_id {
    ($(#[$meta:meta])* $name:ident, $repr:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(v: $repr) -> Self {
                Self(v)
            }

            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

new_id!(
    /// Identity of a row within its table.
    ///
    /// Keys are allocated from a per-table counter and are never reused, so a
    /// key that no longer resolves always means "deleted", never "replaced".
    ObjectKey,
    u64
);

new_id!(
    /// Identity of a column within its table.
    ///
    /// Assigned by the store when a schema is bound. Existing columns keep
    /// their id across migrations; ids of removed columns are not reused.
    ColumnId,
    u32
);

impl ColumnId {
    /// Placeholder for properties that have not been bound to a table yet.
    pub const UNASSIGNED: ColumnId = ColumnId(u32::MAX);

    /// Returns `true` if this id was assigned by a store.
    pub const fn is_assigned(self) -> bool {
        self.0 != u32::MAX
    }

    /// Position of this column's slot in a row's value vector.
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl ObjectKey {
    /// The key following this one in allocation order.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}
