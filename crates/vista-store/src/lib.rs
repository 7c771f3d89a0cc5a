//! Table storage for Vista.
//!
//! A store holds one [`Group`]: the tables of every object type plus the
//! schema version they were bound at. Readers share the committed group
//! behind an `Arc`; a writer works on a private copy and publishes it on
//! commit, so a read never observes a half-applied transaction.
//!
//! # Layout
//!
//! - [`Table`] -- rows of one object type, addressed by [`ObjectKey`](vista_types::ObjectKey)
//! - [`Group`] -- all tables, schema binding and migration, link cleanup
//! - [`Store`] / [`StoreHandle`] -- the open store, its path registry and
//!   write lock
//! - [`WriteTransaction`] -- pending changes
//! - [`file`] -- the on-disk encoding
//!
//! # Rules
//!
//! 1. At most one write transaction per store at a time; a second writer
//!    gets `WriterBusy` instead of blocking.
//! 2. Opening a path that is already open attaches to the same store.
//! 3. File-backed stores are rewritten atomically on every commit.
//! 4. Column ids are never reused, so a bound schema stays valid for the
//!    life of the store.

pub mod error;
pub mod file;
pub mod group;
pub mod store;
pub mod table;

pub use error::{StoreError, StoreResult};
pub use group::Group;
pub use store::{is_open, CommitObserver, ObserverId, Store, StoreConfig, StoreHandle, WriteTransaction};
pub use table::{Column, Row, Table};
