//! Foundation types for Vista.
//!
//! This crate provides the value, identity and type-tag vocabulary shared by
//! every other Vista crate. It performs no I/O and holds no state.
//!
//! # Key Types
//!
//! - [`Value`] -- a single property value as stored in a table row
//! - [`PropertyType`] -- the declared type of a property
//! - [`ObjectKey`] -- stable identity of a row within its table
//! - [`ColumnId`] -- stable identity of a column within its table
//! - [`SchemaVersion`] -- monotonic schema version with an "unversioned" sentinel

pub mod error;
pub mod key;
pub mod property;
pub mod value;
pub mod version;

pub use error::TypeError;
pub use key::{ColumnId, ObjectKey};
pub use property::PropertyType;
pub use value::Value;
pub use version::SchemaVersion;
