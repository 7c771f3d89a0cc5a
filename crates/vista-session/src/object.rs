use std::collections::BTreeMap;
use std::fmt;
use std::slice;
use std::sync::Arc;

use tracing::debug;
use vista_schema::{ObjectDefaults, ObjectSchema, Property};
use vista_store::Group;
use vista_types::{ObjectKey, PropertyType, Value};

use crate::error::{SessionError, SessionResult};
use crate::list::ListView;
use crate::session::Session;

/// Property values supplied when creating an object.
pub type Properties = BTreeMap<String, Value>;

/// A reference to one stored object.
///
/// Reads go through the session, so an object always reflects the session's
/// current view of the store. Once its row is deleted the object is no
/// longer valid and reads fail with `DeletedObject`.
#[derive(Clone)]
pub struct Object {
    session: Session,
    schema: Arc<ObjectSchema>,
    key: ObjectKey,
}

impl Object {
    pub(crate) fn new(session: Session, schema: Arc<ObjectSchema>, key: ObjectKey) -> Self {
        Self {
            session,
            schema,
            key,
        }
    }

    pub fn object_type(&self) -> &str {
        &self.schema.name
    }

    pub fn object_schema(&self) -> &Arc<ObjectSchema> {
        &self.schema
    }

    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns `true` while the session is open and the row exists.
    pub fn is_valid(&self) -> bool {
        self.session
            .read(|group| {
                Ok(group
                    .table(&self.schema.name)
                    .is_some_and(|t| t.contains(self.key)))
            })
            .unwrap_or(false)
    }

    fn property(&self, name: &str) -> SessionResult<&Property> {
        self.schema
            .property(name)
            .ok_or_else(|| unknown_property(&self.schema, name))
    }

    fn deleted(&self) -> SessionError {
        SessionError::DeletedObject(self.schema.name.clone())
    }

    pub fn get(&self, property: &str) -> SessionResult<Value> {
        let column = self.property(property)?.column;
        self.session.read(|group| {
            group
                .table(&self.schema.name)
                .and_then(|t| t.row(self.key))
                .ok_or_else(|| self.deleted())?
                .get(column)
                .cloned()
                .ok_or_else(|| unknown_property(&self.schema, property))
        })
    }

    /// Follow an object link. `None` if the link is null.
    pub fn get_object(&self, property: &str) -> SessionResult<Option<Object>> {
        let prop = self.property(property)?;
        let PropertyType::Object(target) = &prop.property_type else {
            return Err(SessionError::TypeMismatch {
                object_type: self.schema.name.clone(),
                property: property.to_string(),
                reason: format!("{} is not an object link", prop.property_type),
            });
        };
        let target = self.session.object_schema(target)?;
        Ok(self
            .get(property)?
            .as_link()
            .map(|key| Object::new(self.session.clone(), target, key)))
    }

    /// Set one property. Only valid inside a write transaction.
    ///
    /// Unsaved objects assigned to a link or list property are created
    /// first.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> SessionResult<()> {
        let prop = self.property(property)?;
        let value = match coerce_value(&self.schema, prop, value.into())? {
            unsaved @ (Value::Object(_) | Value::Array(_)) => {
                if !self.is_valid() {
                    return Err(self.deleted());
                }
                self.session.materialise(prop, unsaved, false)?
            }
            value => value,
        };
        self.session.write(|group| {
            if !group
                .table(&self.schema.name)
                .is_some_and(|t| t.contains(self.key))
            {
                return Err(self.deleted());
            }
            check_links(group, &self.schema, prop, &value)?;
            if self.schema.primary_key.as_deref() == Some(prop.name.as_str()) {
                check_unique(group, &self.schema, prop, &value, Some(self.key))?;
            }
            group
                .require_table_mut(&self.schema.name)?
                .set(self.key, prop.column, value)?;
            Ok(())
        })
    }

    /// Point an object link at `target`, or clear it.
    pub fn set_object(&self, property: &str, target: Option<&Object>) -> SessionResult<()> {
        let prop = self.property(property)?;
        if let Some(target) = target {
            if prop.property_type.target() != Some(target.object_type()) {
                return Err(SessionError::TypeMismatch {
                    object_type: self.schema.name.clone(),
                    property: property.to_string(),
                    reason: format!("expected {}, got {}", prop.property_type, target.object_type()),
                });
            }
        }
        self.set(property, target.map_or(Value::Null, |t| Value::Link(t.key)))
    }

    /// A live view of a list property.
    pub fn list(&self, property: &str) -> SessionResult<ListView> {
        ListView::new(self.clone(), property)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.session == other.session && self.schema.name == other.schema.name && self.key == other.key
    }
}

impl Eq for Object {}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.schema.name)
            .field("key", &self.key)
            .finish()
    }
}

impl From<&Object> for Value {
    fn from(object: &Object) -> Self {
        Value::Link(object.key)
    }
}

fn unknown_property(schema: &ObjectSchema, property: &str) -> SessionError {
    SessionError::UnknownProperty {
        object_type: schema.name.clone(),
        property: property.to_string(),
    }
}

/// Check `value` against the declared type of `prop`.
pub(crate) fn coerce_value(schema: &ObjectSchema, prop: &Property, value: Value) -> SessionResult<Value> {
    prop.property_type
        .coerce(value, prop.optional)
        .map_err(|e| SessionError::TypeMismatch {
            object_type: schema.name.clone(),
            property: prop.name.clone(),
            reason: e.to_string(),
        })
}

/// Every key a link or list value names must exist in the target table.
fn check_links(group: &Group, schema: &ObjectSchema, prop: &Property, value: &Value) -> SessionResult<()> {
    let Some(target) = prop.property_type.target() else {
        return Ok(());
    };
    let keys: &[ObjectKey] = match value {
        Value::Link(key) => slice::from_ref(key),
        Value::List(keys) => keys,
        _ => return Ok(()),
    };
    let table = group
        .table(target)
        .ok_or_else(|| SessionError::UnknownType(target.to_string()))?;
    match keys.iter().find(|k| !table.contains(**k)) {
        Some(missing) => Err(SessionError::DanglingLink {
            object_type: schema.name.clone(),
            property: prop.name.clone(),
            target: *missing,
        }),
        None => Ok(()),
    }
}

fn check_unique(
    group: &Group,
    schema: &ObjectSchema,
    prop: &Property,
    value: &Value,
    except: Option<ObjectKey>,
) -> SessionResult<()> {
    let clash = group
        .table(&schema.name)
        .and_then(|t| t.find_first(prop.column, value))
        .filter(|key| Some(*key) != except);
    match clash {
        Some(_) => Err(SessionError::DuplicatePrimaryKey {
            object_type: schema.name.clone(),
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

/// The value a property receives at creation: supplied, then defaulted,
/// then implicit.
fn initial_value(
    schema: &ObjectSchema,
    prop: &Property,
    supplied: &Properties,
    defaults: &ObjectDefaults,
) -> SessionResult<Value> {
    if let Some(value) = supplied.get(&prop.name) {
        return Ok(value.clone());
    }
    match defaults.get(&prop.name) {
        Some(value) => coerce_value(schema, prop, value.clone()),
        None if prop.may_be_omitted() => Ok(prop.implicit_value()),
        None => Err(SessionError::MissingProperty {
            object_type: schema.name.clone(),
            property: prop.name.clone(),
        }),
    }
}

impl Session {
    /// Create an object of `object_type` inside the current transaction.
    ///
    /// Omitted properties are filled from the type's factory, then from
    /// declared defaults. With `update_if_exists`, an existing object with
    /// the same primary key is updated instead: only the supplied properties
    /// change.
    ///
    /// Link and list properties also accept unsaved objects
    /// ([`Value::Object`], [`Value::Array`]), supplied or defaulted. Those
    /// are created in the same transaction, with the same
    /// `update_if_exists`, once the parent is known to be creatable.
    pub fn create_object<I, K>(
        &self,
        object_type: &str,
        properties: I,
        update_if_exists: bool,
    ) -> SessionResult<Object>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let schema = self.object_schema(object_type)?;
        let mut supplied = Properties::new();
        for (name, value) in properties {
            let name = name.into();
            let prop = schema
                .property(&name)
                .ok_or_else(|| unknown_property(&schema, &name))?;
            let value = coerce_value(&schema, prop, value)?;
            supplied.insert(name, value);
        }

        self.handle()?;
        if !self.is_in_transaction() {
            return Err(SessionError::NotInTransaction);
        }
        let defaults = self.defaults_for(&schema);
        let existing = self.read(|group| find_existing(group, &schema, &supplied, &defaults, update_if_exists))?;

        for prop in schema.properties.iter().filter(|p| p.property_type.is_link()) {
            let value = match supplied.remove(&prop.name) {
                Some(value) => value,
                None if existing.is_none() => match defaults.get(&prop.name) {
                    Some(default) => coerce_value(&schema, prop, default.clone())?,
                    None => continue,
                },
                None => continue,
            };
            let value = self.materialise(prop, value, update_if_exists)?;
            supplied.insert(prop.name.clone(), value);
        }

        let key = self.write(|group| match existing {
            Some(key) => update_existing(group, &schema, key, &supplied),
            None => insert_new(group, &schema, &supplied, &defaults),
        })?;
        Ok(Object::new(self.clone(), schema, key))
    }

    /// Replace unsaved objects in a link or list value with the keys of
    /// newly created ones.
    pub(crate) fn materialise(&self, prop: &Property, value: Value, update_if_exists: bool) -> SessionResult<Value> {
        let Some(target) = prop.property_type.target() else {
            return Ok(value);
        };
        match value {
            Value::Object(properties) => {
                let object = self.create_object(target, properties, update_if_exists)?;
                Ok(Value::Link(object.key))
            }
            Value::Array(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Link(key) => keys.push(key),
                        Value::Object(properties) => {
                            keys.push(self.create_object(target, properties, update_if_exists)?.key);
                        }
                        other => {
                            return Err(SessionError::TypeMismatch {
                                object_type: target.to_string(),
                                property: prop.name.clone(),
                                reason: format!("list element cannot be {}", other.type_name()),
                            })
                        }
                    }
                }
                Ok(Value::List(keys))
            }
            other => Ok(other),
        }
    }
}

/// The row an upsert would update. Fails with `DuplicatePrimaryKey` when
/// one exists and updating was not asked for.
fn find_existing(
    group: &Group,
    schema: &ObjectSchema,
    supplied: &Properties,
    defaults: &ObjectDefaults,
    update_if_exists: bool,
) -> SessionResult<Option<ObjectKey>> {
    let Some(pk) = schema.primary_key_property() else {
        return Ok(None);
    };
    let value = initial_value(schema, pk, supplied, defaults)?;
    let existing = group
        .table(&schema.name)
        .and_then(|t| t.find_first(pk.column, &value));
    if existing.is_some() && !update_if_exists {
        return Err(SessionError::DuplicatePrimaryKey {
            object_type: schema.name.clone(),
            value: value.to_string(),
        });
    }
    Ok(existing)
}

fn update_existing(
    group: &mut Group,
    schema: &ObjectSchema,
    key: ObjectKey,
    supplied: &Properties,
) -> SessionResult<ObjectKey> {
    for prop in schema.properties.iter().filter(|p| supplied.contains_key(&p.name)) {
        check_links(group, schema, prop, &supplied[&prop.name])?;
    }
    let table = group.require_table_mut(&schema.name)?;
    for prop in schema.properties.iter() {
        if let Some(value) = supplied.get(&prop.name) {
            table.set(key, prop.column, value.clone())?;
        }
    }
    debug!(object_type = %schema.name, key = %key, "updated existing object");
    Ok(key)
}

fn insert_new(
    group: &mut Group,
    schema: &ObjectSchema,
    supplied: &Properties,
    defaults: &ObjectDefaults,
) -> SessionResult<ObjectKey> {
    let mut values = Vec::with_capacity(schema.properties.len());
    for prop in &schema.properties {
        let value = initial_value(schema, prop, supplied, defaults)?;
        check_links(group, schema, prop, &value)?;
        values.push((prop.column, value));
    }

    let table = group.require_table_mut(&schema.name)?;
    let mut row = vec![Value::Null; table.width()];
    for (column, value) in values {
        row[column.slot()] = value;
    }
    let key = table.insert(row)?;
    debug!(object_type = %schema.name, key = %key, "created object");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::Configuration;
    use crate::error::ErrorKind;

    fn kennel(name: &str) -> Session {
        let config = Configuration::new(format!("object-tests/{name}"))
            .with_schema(vec![
                ObjectSchema::new(
                    "Person",
                    vec![
                        Property::new("name", PropertyType::String),
                        Property::new("dogs", PropertyType::List("Dog".into())),
                    ],
                ),
                ObjectSchema::new(
                    "Dog",
                    vec![
                        Property::new("name", PropertyType::String),
                        Property::new("age", PropertyType::Int).with_default(1),
                        Property::new("weight", PropertyType::Double).optional(),
                        Property::new("owner", PropertyType::Object("Person".into())),
                    ],
                )
                .with_primary_key("name"),
            ])
            .in_memory();
        Session::open(config).unwrap()
    }

    fn dog(name: &str) -> Vec<(&'static str, Value)> {
        vec![("name", Value::from(name))]
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    #[test]
    fn defaults_fill_omitted_properties() {
        let s = kennel("defaults");
        let _w = s.begin_write().unwrap();
        let rex = s.create_object("Dog", dog("Rex"), false).unwrap();
        assert_eq!(rex.get("age").unwrap(), Value::Int(1));
        assert_eq!(rex.get("weight").unwrap(), Value::Null);
        assert_eq!(rex.get("owner").unwrap(), Value::Null);
    }

    #[test]
    fn factory_output_beats_declared_default() {
        let s = kennel("factory");
        s.register_factory(
            "Dog",
            Arc::new(|_: &ObjectSchema| {
                let mut defaults = ObjectDefaults::new();
                defaults.insert("age".into(), Value::Int(7));
                defaults.insert("weight".into(), Value::Int(12));
                defaults
            }),
        )
        .unwrap();
        let _w = s.begin_write().unwrap();
        let rex = s.create_object("Dog", dog("Rex"), false).unwrap();
        assert_eq!(rex.get("age").unwrap(), Value::Int(7));
        assert_eq!(rex.get("weight").unwrap(), Value::Double(12.0));

        let fido = s
            .create_object("Dog", vec![("name", Value::from("Fido")), ("age", Value::Int(3))], false)
            .unwrap();
        assert_eq!(fido.get("age").unwrap(), Value::Int(3));
    }

    #[test]
    fn creation_errors() {
        let s = kennel("errors");
        assert_eq!(
            s.create_object("Dog", dog("Rex"), false).unwrap_err().kind(),
            ErrorKind::NotInTransaction
        );

        let _w = s.begin_write().unwrap();
        let kind = |r: SessionResult<Object>| r.unwrap_err().kind();
        assert_eq!(kind(s.create_object("Cat", dog("Tom"), false)), ErrorKind::UnknownType);
        assert_eq!(
            kind(s.create_object("Dog", vec![("name", Value::from("Rex")), ("color", Value::from("red"))], false)),
            ErrorKind::UnknownProperty
        );
        assert_eq!(
            kind(s.create_object("Dog", vec![("name", Value::Int(1))], false)),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            kind(s.create_object("Person", Vec::<(&str, Value)>::new(), false)),
            ErrorKind::MissingProperty
        );
        assert_eq!(
            kind(s.create_object(
                "Dog",
                vec![("name", Value::from("Rex")), ("owner", Value::Link(ObjectKey::new(99)))],
                false
            )),
            ErrorKind::DanglingLink
        );
    }

    #[test]
    fn primary_keys_are_unique_or_updated() {
        let s = kennel("pk");
        let _w = s.begin_write().unwrap();
        let rex = s
            .create_object("Dog", vec![("name", Value::from("Rex")), ("age", Value::Int(2))], false)
            .unwrap();
        assert_eq!(
            s.create_object("Dog", dog("Rex"), false).unwrap_err().kind(),
            ErrorKind::DuplicatePrimaryKey
        );

        let weight = vec![("name", Value::from("Rex")), ("weight", Value::Double(30.5))];
        let again = s.create_object("Dog", weight, true).unwrap();
        assert_eq!(again, rex);
        assert_eq!(rex.get("age").unwrap(), Value::Int(2));
        assert_eq!(rex.get("weight").unwrap(), Value::Double(30.5));
        assert_eq!(s.objects("Dog").unwrap().len().unwrap(), 1);
        assert_eq!(s.object_for_primary_key("Dog", "Rex").unwrap(), Some(rex));
    }

    // -----------------------------------------------------------------------
    // Nested creation
    // -----------------------------------------------------------------------

    fn nested(name: &str) -> Session {
        let link = || PropertyType::Object("Sample".into());
        let links = || PropertyType::List("Sample".into());
        let config = Configuration::new(format!("object-tests/{name}"))
            .with_schema(vec![
                ObjectSchema::new("Sample", vec![Property::new("value", PropertyType::Double)]),
                ObjectSchema::new(
                    "Holder",
                    vec![
                        Property::new("id", PropertyType::String),
                        Property::new("label", PropertyType::String).optional(),
                        Property::new("one", link()),
                        Property::new("many", links()),
                    ],
                )
                .with_primary_key("id"),
                ObjectSchema::new(
                    "Defaulted",
                    vec![
                        Property::new("flag", PropertyType::Bool).with_default(true),
                        Property::new("one", link()).with_default(Value::object([("value", Value::Int(1))])),
                        Property::new("none", link()),
                        Property::new("many", links())
                            .with_default(Value::Array(vec![Value::object([("value", Value::Int(2))])])),
                    ],
                ),
            ])
            .in_memory();
        Session::open(config).unwrap()
    }

    fn sample(value: i64) -> Value {
        Value::object([("value", Value::Int(value))])
    }

    fn linked_value(object: &Object, property: &str) -> Option<Value> {
        object
            .get_object(property)
            .unwrap()
            .map(|o| o.get("value").unwrap())
    }

    #[test]
    fn unsaved_objects_are_created_with_their_parent() {
        let s = nested("nested-create");
        let _w = s.begin_write().unwrap();
        let samples = s.objects("Sample").unwrap();

        let first = vec![
            ("id", Value::from("0")),
            ("label", Value::from("1")),
            ("one", sample(1)),
            ("many", Value::Array(vec![])),
        ];
        let obj0 = s.create_object("Holder", first.clone(), false).unwrap();
        assert_eq!(linked_value(&obj0, "one"), Some(Value::Double(1.0)));
        assert!(obj0.list("many").unwrap().is_empty().unwrap());
        assert_eq!(samples.len().unwrap(), 1);

        // A rejected parent creates none of its nested objects.
        assert_eq!(
            s.create_object("Holder", first, false).unwrap_err().kind(),
            ErrorKind::DuplicatePrimaryKey
        );
        assert_eq!(samples.len().unwrap(), 1);

        let obj1 = s
            .create_object(
                "Holder",
                vec![("id", Value::from("1")), ("one", sample(0)), ("many", Value::Array(vec![sample(2)]))],
                true,
            )
            .unwrap();
        let many = obj1.list("many").unwrap();
        assert_eq!(many.len().unwrap(), 1);
        assert_eq!(many.get(0).unwrap().get("value").unwrap(), Value::Double(2.0));
        assert_eq!(samples.len().unwrap(), 3);

        // Existing objects and unsaved ones mix in one list.
        let existing = many.get(0).unwrap();
        let mixed = Value::Array(vec![Value::from(&existing), sample(3)]);
        s.create_object("Holder", vec![("id", Value::from("2")), ("many", mixed)], false)
            .unwrap();
        assert_eq!(samples.len().unwrap(), 4);
    }

    #[test]
    fn upsert_replaces_nested_links_only_when_supplied() {
        let s = nested("nested-upsert");
        let _w = s.begin_write().unwrap();
        let obj0 = s
            .create_object(
                "Holder",
                vec![("id", Value::from("0")), ("label", Value::from("1")), ("one", sample(1))],
                false,
            )
            .unwrap();

        s.create_object(
            "Holder",
            vec![
                ("id", Value::from("0")),
                ("label", Value::from("2")),
                ("one", Value::Null),
                ("many", Value::Array(vec![sample(2)])),
            ],
            true,
        )
        .unwrap();
        assert_eq!(linked_value(&obj0, "one"), None);
        assert_eq!(obj0.list("many").unwrap().len().unwrap(), 1);

        s.create_object("Holder", vec![("id", Value::from("0"))], true).unwrap();
        assert_eq!(obj0.get("label").unwrap(), Value::from("2"));
        assert_eq!(linked_value(&obj0, "one"), None);

        s.create_object(
            "Holder",
            vec![("id", Value::from("0")), ("label", Value::from("3")), ("one", sample(0))],
            true,
        )
        .unwrap();
        assert_eq!(obj0.get("label").unwrap(), Value::from("3"));
        assert_eq!(linked_value(&obj0, "one"), Some(Value::Double(0.0)));
        assert_eq!(obj0.list("many").unwrap().len().unwrap(), 1);
        assert_eq!(s.objects("Holder").unwrap().len().unwrap(), 1);
    }

    #[test]
    fn object_defaults_are_created_per_object() {
        let s = nested("nested-defaults");
        let _w = s.begin_write().unwrap();
        let obj = s
            .create_object("Defaulted", Vec::<(&str, Value)>::new(), false)
            .unwrap();
        assert_eq!(obj.get("flag").unwrap(), Value::Bool(true));
        assert_eq!(linked_value(&obj, "one"), Some(Value::Double(1.0)));
        assert_eq!(linked_value(&obj, "none"), None);
        let many = obj.list("many").unwrap();
        assert_eq!(many.len().unwrap(), 1);
        assert_eq!(many.get(0).unwrap().get("value").unwrap(), Value::Double(2.0));

        let other = s
            .create_object("Defaulted", vec![("one", Value::Null)], false)
            .unwrap();
        assert_eq!(linked_value(&other, "one"), None);
        assert_ne!(other.list("many").unwrap().keys().unwrap(), many.keys().unwrap());
        assert_eq!(s.objects("Sample").unwrap().len().unwrap(), 3);
    }

    #[test]
    fn set_creates_unsaved_objects() {
        let s = nested("nested-set");
        let _w = s.begin_write().unwrap();
        let holder = s.create_object("Holder", vec![("id", Value::from("0"))], false).unwrap();
        holder.set("one", sample(5)).unwrap();
        assert_eq!(linked_value(&holder, "one"), Some(Value::Double(5.0)));
        holder.set("many", Value::Array(vec![sample(6), sample(7)])).unwrap();
        assert_eq!(holder.list("many").unwrap().len().unwrap(), 2);

        assert_eq!(
            holder.set("many", Value::Array(vec![Value::Int(1)])).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            holder.set("one", Value::object([("value", Value::from("x"))])).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(
            holder.set("one", Value::object([("weight", Value::Int(1))])).unwrap_err().kind(),
            ErrorKind::UnknownProperty
        );
        assert_eq!(s.objects("Sample").unwrap().len().unwrap(), 3);
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    #[test]
    fn set_checks_transaction_type_and_uniqueness() {
        let s = kennel("set");
        let scope = s.begin_write().unwrap();
        let rex = s.create_object("Dog", dog("Rex"), false).unwrap();
        s.create_object("Dog", dog("Fido"), false).unwrap();
        scope.commit().unwrap();

        assert_eq!(rex.set("age", 4).unwrap_err().kind(), ErrorKind::NotInTransaction);

        let _w = s.begin_write().unwrap();
        rex.set("age", 4).unwrap();
        assert_eq!(rex.get("age").unwrap(), Value::Int(4));
        assert_eq!(rex.set("age", "old").unwrap_err().kind(), ErrorKind::TypeMismatch);
        assert_eq!(rex.set("name", "Fido").unwrap_err().kind(), ErrorKind::DuplicatePrimaryKey);
        rex.set("name", "Rex").unwrap();
    }

    #[test]
    fn links_are_followed_and_type_checked() {
        let s = kennel("links");
        let _w = s.begin_write().unwrap();
        let ann = s.create_object("Person", vec![("name", Value::from("Ann"))], false).unwrap();
        let rex = s.create_object("Dog", dog("Rex"), false).unwrap();
        let fido = s.create_object("Dog", dog("Fido"), false).unwrap();

        rex.set_object("owner", Some(&ann)).unwrap();
        assert_eq!(rex.get_object("owner").unwrap(), Some(ann.clone()));
        assert_eq!(
            rex.set_object("owner", Some(&fido)).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
        assert_eq!(rex.get_object("age").unwrap_err().kind(), ErrorKind::TypeMismatch);
        rex.set_object("owner", None).unwrap();
        assert_eq!(rex.get_object("owner").unwrap(), None);
    }

    #[test]
    fn deleted_objects_are_invalid() {
        let s = kennel("deleted");
        let _w = s.begin_write().unwrap();
        let rex = s.create_object("Dog", dog("Rex"), false).unwrap();
        assert!(rex.is_valid());
        s.delete(&rex).unwrap();
        assert!(!rex.is_valid());
        assert_eq!(rex.get("age").unwrap_err().kind(), ErrorKind::DeletedObject);
        assert_eq!(rex.set("age", 3).unwrap_err().kind(), ErrorKind::DeletedObject);
    }
}
