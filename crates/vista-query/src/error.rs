/// Errors from predicate compilation and query evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The predicate text could not be compiled.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),

    /// A key path names a property the type does not have.
    #[error("{object_type} has no property {property}")]
    UnknownProperty {
        object_type: String,
        property: String,
    },

    /// The query targets a type with no table.
    #[error("unknown object type: {0}")]
    UnknownType(String),
}

impl QueryError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidPredicate(reason.into())
    }
}

/// Result alias for query operations.
pub type QueryResult<T> = Result<T, QueryError>;
