//! Schema registry for Vista.
//!
//! A [`Schema`] is the validated, ordered set of [`ObjectSchema`]s a store is
//! bound to. Each object schema lists its [`Property`]s in declaration order;
//! every property carries the [`ColumnId`](vista_types::ColumnId) the store
//! assigned to it when the schema was bound.
//!
//! Per-type creation defaults live beside the schema: declared property
//! defaults, plus optional [`ObjectFactory`] closures registered in a
//! [`DefaultsRegistry`] that compute defaults at creation time.
//!
//! Schemas can be built in code or loaded from a JSON [`SchemaDescriptor`].

pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod object_schema;
pub mod schema;

pub use defaults::{DefaultsRegistry, ObjectDefaults, ObjectFactory};
pub use descriptor::{ObjectSchemaDescriptor, PropertyDescriptor, SchemaDescriptor};
pub use error::{SchemaError, SchemaResult};
pub use object_schema::{ObjectSchema, Property};
pub use schema::Schema;
