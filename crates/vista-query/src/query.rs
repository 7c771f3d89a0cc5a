use std::sync::Arc;

use tracing::debug;
use vista_store::Group;
use vista_types::ObjectKey;

use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::sort::SortDescriptor;

/// An immutable query over one table.
///
/// Queries are cheap to clone: the filter is shared. Refining a query with
/// [`and`](Self::and) produces a new query and leaves this one untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    table: String,
    filter: Arc<Filter>,
}

impl Query {
    /// Match every object in `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Arc::new(Filter::True),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// A new query matching objects that satisfy both this query and
    /// `filter`.
    pub fn and(&self, filter: Filter) -> Query {
        Query {
            table: self.table.clone(),
            filter: Arc::new(Filter::clone(&self.filter).and(filter)),
        }
    }

    /// Keys of matching objects in table order, then ordered by `sort`.
    pub fn evaluate(&self, group: &Group, sort: Option<&SortDescriptor>) -> QueryResult<Vec<ObjectKey>> {
        let table = group
            .table(&self.table)
            .ok_or_else(|| QueryError::UnknownType(self.table.clone()))?;
        let mut keys: Vec<ObjectKey> = match *self.filter {
            Filter::True => table.keys().collect(),
            ref filter => table
                .keys()
                .filter(|k| filter.matches(group, table, *k))
                .collect(),
        };
        if let Some(sort) = sort {
            sort.apply(group, table, &mut keys);
        }
        debug!(table = %self.table, matched = keys.len(), of = table.len(), "evaluated query");
        Ok(keys)
    }

    /// Number of matching objects.
    pub fn count(&self, group: &Group) -> QueryResult<usize> {
        let table = group
            .table(&self.table)
            .ok_or_else(|| QueryError::UnknownType(self.table.clone()))?;
        Ok(match *self.filter {
            Filter::True => table.len(),
            ref filter => table.keys().filter(|k| filter.matches(group, table, *k)).count(),
        })
    }
}
