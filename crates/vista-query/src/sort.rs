use std::cmp::Ordering;

use vista_schema::{ObjectSchema, Schema};
use vista_store::{Group, Table};
use vista_types::{ObjectKey, PropertyType, Value};

use crate::error::{QueryError, QueryResult};
use crate::filter::KeyPath;

/// One sort criterion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub path: KeyPath,
    pub ascending: bool,
}

/// Ordered sort criteria; later keys break ties left by earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortDescriptor {
    keys: Vec<SortKey>,
}

impl SortDescriptor {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Resolve `(property, ascending)` pairs against `object_schema`.
    /// Property names may be dotted paths through object links.
    pub fn resolve<S: AsRef<str>>(
        spec: &[(S, bool)],
        object_schema: &ObjectSchema,
        schema: &Schema,
    ) -> QueryResult<Self> {
        let keys = spec
            .iter()
            .map(|(name, ascending)| {
                let names: Vec<&str> = name.as_ref().split('.').collect();
                let path = KeyPath::resolve(&names, object_schema, schema)?;
                if let PropertyType::List(_) = path.property_type() {
                    return Err(QueryError::UnknownProperty {
                        object_type: object_schema.name.clone(),
                        property: format!("{} (lists are not sortable)", name.as_ref()),
                    });
                }
                Ok(SortKey {
                    path,
                    ascending: *ascending,
                })
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stable-sort `keys`, rows of `table`, by the criteria.
    pub fn apply(&self, group: &Group, table: &Table, keys: &mut Vec<ObjectKey>) {
        if self.keys.is_empty() {
            return;
        }
        let mut decorated: Vec<(ObjectKey, Vec<&Value>)> = keys
            .iter()
            .map(|&key| {
                let values = self
                    .keys
                    .iter()
                    .map(|k| k.path.value(group, table, key).unwrap_or(&Value::Null))
                    .collect();
                (key, values)
            })
            .collect();

        decorated.sort_by(|(_, a), (_, b)| {
            self.keys
                .iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(k, (x, y))| {
                    let ord = x.sort_cmp(y);
                    if k.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        keys.clear();
        keys.extend(decorated.into_iter().map(|(key, _)| key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vista_schema::Property;
    use vista_types::SchemaVersion;

    fn setup(rows: &[(&str, i64)]) -> (Group, Schema) {
        let declared = Schema::new(vec![ObjectSchema::new(
            "Item",
            vec![
                Property::new("name", PropertyType::String),
                Property::new("rank", PropertyType::Int),
                Property::new("tags", PropertyType::List("Item".into())),
            ],
        )])
        .unwrap();
        let mut group = Group::new();
        let schema = group.bind(Some(&declared), SchemaVersion::new(0)).unwrap();
        let items = group.require_table_mut("Item").unwrap();
        for (name, rank) in rows {
            items
                .insert(vec![Value::from(*name), Value::Int(*rank), Value::List(vec![])])
                .unwrap();
        }
        (group, schema)
    }

    fn sorted_names(group: &Group, schema: &Schema, spec: &[(&str, bool)]) -> Vec<String> {
        let item = schema.get("Item").unwrap();
        let sort = SortDescriptor::resolve(spec, item, schema).unwrap();
        let table = group.table("Item").unwrap();
        let mut keys: Vec<_> = table.keys().collect();
        sort.apply(group, table, &mut keys);
        let name = item.column_of("name").unwrap();
        keys.iter()
            .map(|k| table.get(*k, name).unwrap().as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn multi_key_sort() {
        let (g, s) = setup(&[("b", 2), ("a", 2), ("c", 1)]);
        assert_eq!(sorted_names(&g, &s, &[("rank", true), ("name", true)]), ["c", "a", "b"]);
        assert_eq!(sorted_names(&g, &s, &[("rank", false), ("name", false)]), ["b", "a", "c"]);
    }

    #[test]
    fn sort_is_stable() {
        let (g, s) = setup(&[("x", 1), ("y", 1), ("z", 0)]);
        assert_eq!(sorted_names(&g, &s, &[("rank", true)]), ["z", "x", "y"]);
    }

    #[test]
    fn unknown_and_list_properties_fail() {
        let (_, s) = setup(&[]);
        let item = s.get("Item").unwrap();
        assert!(matches!(
            SortDescriptor::resolve(&[("nope", true)], item, &s),
            Err(QueryError::UnknownProperty { .. })
        ));
        assert!(SortDescriptor::resolve(&[("tags", true)], item, &s).is_err());
    }

    proptest! {
        #[test]
        fn descending_reverses_ascending_for_unique_keys(
            ranks in proptest::collection::hash_set(-1000i64..1000, 0..40)
        ) {
            let rows: Vec<(String, i64)> =
                ranks.iter().map(|r| (format!("n{r}"), *r)).collect();
            let refs: Vec<(&str, i64)> = rows.iter().map(|(n, r)| (n.as_str(), *r)).collect();
            let (g, s) = setup(&refs);
            let mut asc = sorted_names(&g, &s, &[("rank", true)]);
            let desc = sorted_names(&g, &s, &[("rank", false)]);
            asc.reverse();
            prop_assert_eq!(asc, desc);
        }
    }
}
