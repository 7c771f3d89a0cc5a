use vista_types::TypeError;

/// Errors raised while building or validating a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A type or property name is empty.
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    /// Two object schemas share a name.
    #[error("duplicate object type '{0}'")]
    DuplicateType(String),

    /// Two properties of one object schema share a name.
    #[error("duplicate property '{property}' on '{object_type}'")]
    DuplicateProperty {
        object_type: String,
        property: String,
    },

    /// The declared primary key is missing or unsuitable.
    #[error("invalid primary key '{property}' on '{object_type}': {reason}")]
    InvalidPrimaryKey {
        object_type: String,
        property: String,
        reason: String,
    },

    /// A link property targets a type that is not in the schema.
    #[error("property '{object_type}.{property}' links to unknown type '{target}'")]
    UnknownLinkTarget {
        object_type: String,
        property: String,
        target: String,
    },

    /// A list property was declared optional.
    #[error("list property '{object_type}.{property}' cannot be optional")]
    OptionalList {
        object_type: String,
        property: String,
    },

    /// A declared default does not match the property type.
    #[error("invalid default for '{object_type}.{property}': {source}")]
    InvalidDefault {
        object_type: String,
        property: String,
        source: TypeError,
    },

    /// A property type name could not be parsed.
    #[error("invalid property type for '{object_type}.{property}': {source}")]
    InvalidType {
        object_type: String,
        property: String,
        source: TypeError,
    },

    /// The schema description could not be decoded.
    #[error("malformed schema description: {0}")]
    Descriptor(String),
}

/// Result alias for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

impl From<serde_json::Error> for SchemaError {
    fn from(e: serde_json::Error) -> Self {
        SchemaError::Descriptor(e.to_string())
    }
}
