use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vista_schema::{ObjectSchema, Property, SchemaError};
use vista_types::{ColumnId, ObjectKey, PropertyType, Value};

use crate::error::{StoreError, StoreResult};

/// Stored metadata of one column.
///
/// Carries enough of the declaring [`Property`] to rebuild the schema of a
/// store opened without one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub property_type: PropertyType,
    pub optional: bool,
    pub default: Option<Value>,
    /// Removed columns keep their slot so ids stay dense; their values are
    /// cleared and they are invisible to lookups.
    pub removed: bool,
}

impl Column {
    fn from_property(id: ColumnId, prop: &Property) -> Self {
        Self {
            id,
            name: prop.name.clone(),
            property_type: prop.property_type.clone(),
            optional: prop.optional,
            default: prop.default.clone(),
            removed: false,
        }
    }

    /// Returns `true` if `prop` can be stored in this column unchanged.
    pub fn matches(&self, prop: &Property) -> bool {
        !self.removed
            && self.name == prop.name
            && self.property_type == prop.property_type
            && self.optional == prop.optional
    }

    fn to_property(&self) -> Property {
        Property {
            name: self.name.clone(),
            property_type: self.property_type.clone(),
            optional: self.optional,
            default: self.default.clone(),
            column: self.id,
        }
    }

    /// Value given to existing rows when the column is added.
    fn fill_value(prop: &Property) -> Value {
        match &prop.default {
            Some(v) => v.clone(),
            None if prop.may_be_omitted() => prop.implicit_value(),
            None => prop.property_type.zero_value(prop.optional),
        }
    }
}

/// One object: its key and a value per column slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub key: ObjectKey,
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, column: ColumnId) -> Option<&Value> {
        self.values.get(column.slot())
    }
}

/// Rows of one object type.
///
/// Row order is insertion order until a row is removed; removal moves the
/// last row into the freed position.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    primary_key: Option<String>,
    rows: Vec<Row>,
    next_key: ObjectKey,
    #[serde(skip)]
    positions: HashMap<ObjectKey, usize>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            rows: Vec::new(),
            next_key: ObjectKey::new(0),
            positions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of slots in every row, removed columns included.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Columns that are still part of the schema.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.removed)
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id.slot()).filter(|c| !c.removed)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Append a column for `prop`, filling existing rows. Returns its id.
    pub fn add_column(&mut self, prop: &Property) -> ColumnId {
        let id = ColumnId::new(self.columns.len() as u32);
        let fill = Column::fill_value(prop);
        for row in &mut self.rows {
            row.values.push(fill.clone());
        }
        self.columns.push(Column::from_property(id, prop));
        id
    }

    /// Retire a column. Its id is never handed out again.
    pub fn remove_column(&mut self, id: ColumnId) -> StoreResult<()> {
        let column = self
            .columns
            .get_mut(id.slot())
            .filter(|c| !c.removed)
            .ok_or_else(|| StoreError::NoSuchColumn {
                table: self.name.clone(),
                column: id,
            })?;
        column.removed = true;
        for row in &mut self.rows {
            row.values[id.slot()] = Value::Null;
        }
        Ok(())
    }

    /// Refresh the stored default of an existing column.
    pub(crate) fn set_column_default(&mut self, id: ColumnId, default: Option<Value>) {
        if let Some(column) = self.columns.get_mut(id.slot()) {
            column.default = default;
        }
    }

    /// Declare `name` as the primary key, checking existing rows for clashes.
    pub fn set_primary_key(&mut self, name: Option<&str>) -> StoreResult<()> {
        if let Some(name) = name {
            let column = self
                .column_by_name(name)
                .map(|c| c.id)
                .ok_or_else(|| SchemaError::InvalidPrimaryKey {
                    object_type: self.name.clone(),
                    property: name.to_string(),
                    reason: "no such property".to_string(),
                })?;
            let mut seen: Vec<&Value> = Vec::with_capacity(self.rows.len());
            for row in &self.rows {
                let value = &row.values[column.slot()];
                if seen.contains(&value) {
                    return Err(StoreError::DuplicatePrimaryKey {
                        table: self.name.clone(),
                        value: value.to_string(),
                    });
                }
                seen.push(value);
            }
        }
        self.primary_key = name.map(str::to_string);
        Ok(())
    }

    /// Rebuild the object schema this table stores.
    pub fn object_schema(&self) -> ObjectSchema {
        let properties = self.columns().map(Column::to_property).collect();
        ObjectSchema {
            name: self.name.clone(),
            properties,
            primary_key: self.primary_key.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Rows
    // -----------------------------------------------------------------------

    /// Append a row. `values` must have one entry per slot.
    pub fn insert(&mut self, values: Vec<Value>) -> StoreResult<ObjectKey> {
        if values.len() != self.width() {
            return Err(StoreError::Arity {
                table: self.name.clone(),
                expected: self.width(),
                found: values.len(),
            });
        }
        let key = self.next_key;
        self.next_key = key.next();
        self.positions.insert(key, self.rows.len());
        self.rows.push(Row { key, values });
        Ok(key)
    }

    /// The key the next insert receives.
    pub fn next_key(&self) -> ObjectKey {
        self.next_key
    }

    /// Never hand out keys below `floor`.
    pub fn reserve_keys(&mut self, floor: ObjectKey) {
        self.next_key = self.next_key.max(floor);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.rows.iter().map(|r| r.key)
    }

    pub fn position(&self, key: ObjectKey) -> Option<usize> {
        self.positions.get(&key).copied()
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.positions.contains_key(&key)
    }

    pub fn row(&self, key: ObjectKey) -> Option<&Row> {
        self.position(key).map(|i| &self.rows[i])
    }

    pub fn get(&self, key: ObjectKey, column: ColumnId) -> Option<&Value> {
        self.column(column)?;
        self.row(key).and_then(|r| r.get(column))
    }

    pub fn set(&mut self, key: ObjectKey, column: ColumnId, value: Value) -> StoreResult<()> {
        if self.column(column).is_none() {
            return Err(StoreError::NoSuchColumn {
                table: self.name.clone(),
                column,
            });
        }
        let index = self.position(key).ok_or_else(|| StoreError::NoSuchObject {
            table: self.name.clone(),
            key,
        })?;
        self.rows[index].values[column.slot()] = value;
        Ok(())
    }

    /// First row whose value in `column` equals `value`.
    pub fn find_first(&self, column: ColumnId, value: &Value) -> Option<ObjectKey> {
        self.rows
            .iter()
            .find(|r| r.get(column) == Some(value))
            .map(|r| r.key)
    }

    /// Remove the row at `index` by moving the last row into its place.
    ///
    /// Returns the removed key. Rows other than the last keep their position.
    pub fn move_last_over(&mut self, index: usize) -> Option<ObjectKey> {
        if index >= self.rows.len() {
            return None;
        }
        let removed = self.rows.swap_remove(index);
        self.positions.remove(&removed.key);
        if let Some(moved) = self.rows.get(index) {
            self.positions.insert(moved.key, index);
        }
        Some(removed.key)
    }

    /// Remove the row for `key`. Returns `false` if it did not exist.
    pub fn remove(&mut self, key: ObjectKey) -> bool {
        match self.position(key) {
            Some(index) => self.move_last_over(index).is_some(),
            None => false,
        }
    }

    /// Remove every row. Keys are not reused afterwards.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.positions.clear();
    }

    /// Null out links to `target` and drop it from lists in `column`.
    pub(crate) fn unlink(&mut self, column: ColumnId, target: ObjectKey) -> usize {
        let slot = column.slot();
        let mut touched = 0;
        for row in &mut self.rows {
            let value = &mut row.values[slot];
            if value.as_link() == Some(target) {
                *value = Value::Null;
                touched += 1;
            } else if let Value::List(keys) = value {
                let before = keys.len();
                keys.retain(|k| *k != target);
                touched += before - keys.len();
            }
        }
        touched
    }

    /// Rebuild the key index after deserialization.
    pub(crate) fn reindex(&mut self) {
        self.positions = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.key, i))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        let mut t = Table::new("Person");
        t.add_column(&Property::new("name", PropertyType::String));
        t.add_column(&Property::new("age", PropertyType::Int));
        t
    }

    fn person(t: &mut Table, name: &str, age: i64) -> ObjectKey {
        t.insert(vec![Value::from(name), Value::Int(age)]).unwrap()
    }

    // -----------------------------------------------------------------------
    // Rows
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_get() {
        let mut t = people();
        let k = person(&mut t, "Ann", 30);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(k, ColumnId::new(1)), Some(&Value::Int(30)));
        assert!(t.contains(k));
    }

    #[test]
    fn insert_checks_arity() {
        let mut t = people();
        let err = t.insert(vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, StoreError::Arity { expected: 2, found: 1, .. }));
    }

    #[test]
    fn keys_are_not_reused() {
        let mut t = people();
        let a = person(&mut t, "a", 1);
        t.clear();
        let b = person(&mut t, "b", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn move_last_over_moves_the_tail() {
        let mut t = people();
        let a = person(&mut t, "a", 1);
        let b = person(&mut t, "b", 2);
        let c = person(&mut t, "c", 3);

        assert_eq!(t.move_last_over(0), Some(a));
        assert_eq!(t.keys().collect::<Vec<_>>(), vec![c, b]);
        assert_eq!(t.position(c), Some(0));
        assert_eq!(t.position(b), Some(1));
        assert_eq!(t.position(a), None);
        assert_eq!(t.move_last_over(5), None);
    }

    #[test]
    fn remove_last_row() {
        let mut t = people();
        let a = person(&mut t, "a", 1);
        assert!(t.remove(a));
        assert!(!t.remove(a));
        assert!(t.is_empty());
    }

    #[test]
    fn set_unknown_object() {
        let mut t = people();
        let err = t
            .set(ObjectKey::new(42), ColumnId::new(0), Value::from("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchObject { .. }));
    }

    // -----------------------------------------------------------------------
    // Columns
    // -----------------------------------------------------------------------

    #[test]
    fn added_column_fills_existing_rows() {
        let mut t = people();
        let k = person(&mut t, "a", 1);
        let id = t.add_column(&Property::new("score", PropertyType::Double).with_default(1.5));
        assert_eq!(t.get(k, id), Some(&Value::Double(1.5)));

        let nick = t.add_column(&Property::new("nick", PropertyType::String).optional());
        assert_eq!(t.get(k, nick), Some(&Value::Null));

        let must = t.add_column(&Property::new("flag", PropertyType::Bool));
        assert_eq!(t.get(k, must), Some(&Value::Bool(false)));
    }

    #[test]
    fn removed_column_keeps_its_slot() {
        let mut t = people();
        let k = person(&mut t, "a", 1);
        t.remove_column(ColumnId::new(0)).unwrap();
        assert!(t.column_by_name("name").is_none());
        assert_eq!(t.width(), 2);
        assert_eq!(t.get(k, ColumnId::new(0)), None);

        let id = t.add_column(&Property::new("name", PropertyType::String));
        assert_eq!(id, ColumnId::new(2));
    }

    #[test]
    fn primary_key_rejects_existing_duplicates() {
        let mut t = people();
        person(&mut t, "a", 1);
        person(&mut t, "a", 2);
        assert!(matches!(
            t.set_primary_key(Some("name")),
            Err(StoreError::DuplicatePrimaryKey { .. })
        ));
        t.set_primary_key(Some("age")).unwrap();
        assert_eq!(t.primary_key(), Some("age"));
    }

    #[test]
    fn object_schema_round_trips_columns() {
        let mut t = people();
        t.set_primary_key(Some("name")).unwrap();
        let schema = t.object_schema();
        assert_eq!(schema.name, "Person");
        assert_eq!(schema.primary_key.as_deref(), Some("name"));
        assert_eq!(schema.property("age").unwrap().column, ColumnId::new(1));
        assert!(schema.is_bound());
    }

    #[test]
    fn unlink_clears_links_and_list_entries() {
        let mut t = Table::new("Owner");
        let pet = t.add_column(&Property::new("pet", PropertyType::Object("Dog".into())));
        let pets = t.add_column(&Property::new("pets", PropertyType::List("Dog".into())));
        let dog = ObjectKey::new(7);
        let other = ObjectKey::new(8);
        let k = t
            .insert(vec![Value::Link(dog), Value::List(vec![dog, other, dog])])
            .unwrap();

        assert_eq!(t.unlink(pet, dog), 1);
        assert_eq!(t.unlink(pets, dog), 2);
        assert_eq!(t.get(k, pet), Some(&Value::Null));
        assert_eq!(t.get(k, pets), Some(&Value::List(vec![other])));
    }
}
