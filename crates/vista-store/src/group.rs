use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vista_schema::{ObjectSchema, Schema};
use vista_types::{ObjectKey, SchemaVersion};

use crate::error::{StoreError, StoreResult};
use crate::table::Table;

/// The full contents of a store at one version: every table plus the schema
/// version they were bound at.
///
/// A write transaction works on a private clone of the committed group and
/// swaps it in on commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    schema_version: SchemaVersion,
    tables: Vec<Table>,
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

impl Group {
    /// An empty group that has never been bound to a schema.
    pub fn new() -> Self {
        Self {
            schema_version: SchemaVersion::UNVERSIONED,
            tables: Vec::new(),
        }
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema_version
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    /// Like [`table_mut`](Self::table_mut), failing with `NoSuchTable`.
    pub fn require_table_mut(&mut self, name: &str) -> StoreResult<&mut Table> {
        self.table_mut(name)
            .ok_or_else(|| StoreError::NoSuchTable(name.to_string()))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Total number of objects across all tables.
    /// Each table's next key, by table name.
    pub fn key_marks(&self) -> impl Iterator<Item = (&str, ObjectKey)> {
        self.tables.iter().map(|t| (t.name(), t.next_key()))
    }

    /// Raise every table's key counter to at least its entry in `marks`.
    pub fn reserve_keys(&mut self, marks: &HashMap<String, ObjectKey>) {
        for table in &mut self.tables {
            if let Some(floor) = marks.get(table.name()) {
                table.reserve_keys(*floor);
            }
        }
    }

    pub fn object_count(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }

    /// The schema currently stored, with columns bound.
    pub fn stored_schema(&self) -> StoreResult<Schema> {
        let types = self.tables.iter().map(Table::object_schema).collect();
        Ok(Schema::new(types)?)
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    /// Delete one object and clear every link and list entry pointing at it.
    ///
    /// Returns `false` if the object did not exist.
    pub fn delete_object(&mut self, table: &str, key: ObjectKey) -> StoreResult<bool> {
        let removed = self.require_table_mut(table)?.remove(key);
        if removed {
            self.unlink_all(table, key);
        }
        Ok(removed)
    }

    /// Delete every object of `table`, clearing links into it.
    pub fn clear_table(&mut self, table: &str) -> StoreResult<usize> {
        let t = self.require_table_mut(table)?;
        let keys: Vec<ObjectKey> = t.keys().collect();
        t.clear();
        for key in &keys {
            self.unlink_all(table, *key);
        }
        Ok(keys.len())
    }

    fn unlink_all(&mut self, target_table: &str, key: ObjectKey) {
        for table in &mut self.tables {
            let columns: Vec<_> = table
                .columns()
                .filter(|c| c.property_type.target() == Some(target_table))
                .map(|c| c.id)
                .collect();
            for column in columns {
                table.unlink(column, key);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Schema binding
    // -----------------------------------------------------------------------

    /// Bind `schema` at `version`, creating or migrating tables as needed,
    /// and return the schema with every property's column assigned.
    ///
    /// `None` keeps whatever is stored. A first bind creates every table. A
    /// later bind at the same version must declare the same shape; a higher
    /// version migrates: matching columns keep their id, changed or new
    /// properties get new columns, and anything no longer declared is
    /// removed.
    pub fn bind(&mut self, schema: Option<&Schema>, version: SchemaVersion) -> StoreResult<Schema> {
        let Some(schema) = schema else {
            return self.stored_schema();
        };

        let stored = self.schema_version;
        if !stored.accepts(version) {
            return Err(StoreError::SchemaVersionRegressed {
                stored,
                requested: version,
            });
        }
        if !stored.is_unversioned() && stored == version {
            if !self.stored_schema()?.same_shape(schema) {
                return Err(StoreError::SchemaChangedWithoutVersion(stored));
            }
        } else {
            if !stored.is_unversioned() {
                info!(from = %stored, to = %version, "migrating schema");
            }
            self.migrate(schema)?;
            self.schema_version = version;
        }

        let types = schema
            .iter()
            .map(|ty| self.bind_object(ty))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Schema::new(types)?)
    }

    fn migrate(&mut self, schema: &Schema) -> StoreResult<()> {
        let before = self.tables.len();
        self.tables.retain(|t| schema.contains(t.name()));
        if self.tables.len() != before {
            debug!(dropped = before - self.tables.len(), "removed undeclared tables");
        }

        for ty in schema.iter() {
            if self.table(&ty.name).is_none() {
                debug!(table = %ty.name, "creating table");
                self.tables.push(Table::new(ty.name.clone()));
            }
            let table = self.require_table_mut(&ty.name)?;

            let stale: Vec<_> = table
                .columns()
                .filter(|c| !ty.properties.iter().any(|p| c.matches(p)))
                .map(|c| c.id)
                .collect();
            for id in stale {
                table.remove_column(id)?;
            }
            for prop in &ty.properties {
                match table.column_by_name(&prop.name).map(|c| c.id) {
                    Some(id) => table.set_column_default(id, prop.default.clone()),
                    None => {
                        let id = table.add_column(prop);
                        debug!(table = %ty.name, column = %prop.name, id = %id, "added column");
                    }
                }
            }
            table.set_primary_key(ty.primary_key.as_deref())?;
        }
        Ok(())
    }

    fn bind_object(&self, ty: &ObjectSchema) -> StoreResult<ObjectSchema> {
        let table = self
            .table(&ty.name)
            .ok_or_else(|| StoreError::NoSuchTable(ty.name.clone()))?;
        let mut bound = ty.clone();
        for prop in &mut bound.properties {
            prop.column = table
                .column_by_name(&prop.name)
                .map(|c| c.id)
                .ok_or_else(|| StoreError::NoSuchProperty {
                    table: ty.name.clone(),
                    property: prop.name.clone(),
                })?;
        }
        Ok(bound)
    }

    /// Restore in-memory indexes after decoding.
    pub(crate) fn reindex(&mut self) {
        for table in &mut self.tables {
            table.reindex();
        }
    }
}
