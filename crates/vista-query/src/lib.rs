//! Live query machinery for Vista.
//!
//! - [`PredicateCompiler`] / [`DefaultCompiler`] -- predicate text to [`Filter`]
//! - [`Query`] -- an immutable filter over one table, refined with `and`
//! - [`SortDescriptor`] -- stable multi-key ordering
//! - [`diff_keys`] -- the [`ViewChange`] between two evaluations
//!
//! Queries never cache results: every evaluation reads the group it is given,
//! which is what keeps a live view current.

pub mod compiler;
pub mod diff;
pub mod error;
pub mod filter;
mod lexer;
pub mod query;
pub mod sort;

pub use compiler::{DefaultCompiler, PredicateCompiler};
pub use diff::{diff_keys, ViewChange};
pub use error::{QueryError, QueryResult};
pub use filter::{CompareOp, Filter, KeyPath, PathStep, StringOp};
pub use query::Query;
pub use sort::{SortDescriptor, SortKey};
