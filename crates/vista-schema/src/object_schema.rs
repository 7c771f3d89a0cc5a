use serde::{Deserialize, Serialize};
use vista_types::{ColumnId, PropertyType, Value};

use crate::error::{SchemaError, SchemaResult};

/// A single declared property of an object type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    /// Whether the property accepts `Null`. Object links are always nullable
    /// regardless of this flag.
    pub optional: bool,
    /// Value used at creation time when the property is omitted.
    pub default: Option<Value>,
    /// Column identity assigned by the store at bind time.
    pub column: ColumnId,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            optional: false,
            default: None,
            column: ColumnId::UNASSIGNED,
        }
    }

    /// Mark the property as nullable.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Declare a creation-time default.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Returns `true` if `Null` is an acceptable value.
    pub fn is_nullable(&self) -> bool {
        self.optional || matches!(self.property_type, PropertyType::Object(_))
    }

    /// Returns `true` if creation may omit this property: it has a default,
    /// is nullable, or is a list (which starts empty).
    pub fn may_be_omitted(&self) -> bool {
        self.default.is_some()
            || self.is_nullable()
            || matches!(self.property_type, PropertyType::List(_))
    }

    /// The value an omitted property without a default receives.
    pub fn implicit_value(&self) -> Value {
        match self.property_type {
            PropertyType::List(_) => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }
}

/// The declared shape of one object type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    pub name: String,
    pub properties: Vec<Property>,
    pub primary_key: Option<String>,
}

impl ObjectSchema {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
            primary_key: None,
        }
    }

    /// Declare `property` as this type's primary key.
    pub fn with_primary_key(mut self, property: impl Into<String>) -> Self {
        self.primary_key = Some(property.into());
        self
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a property by its bound column.
    pub fn property_for_column(&self, column: ColumnId) -> Option<&Property> {
        self.properties.iter().find(|p| p.column == column)
    }

    /// Column bound to the named property, if the property exists.
    pub fn column_of(&self, name: &str) -> Option<ColumnId> {
        self.property(name).map(|p| p.column)
    }

    /// The primary key property, if one is declared.
    pub fn primary_key_property(&self) -> Option<&Property> {
        self.primary_key.as_deref().and_then(|pk| self.property(pk))
    }

    /// Returns `true` once every property has been bound to a column.
    pub fn is_bound(&self) -> bool {
        self.properties.iter().all(|p| p.column.is_assigned())
    }

    /// Checks that only depend on this type: names, duplicates, primary key,
    /// list optionality and default types. Link targets are checked by
    /// [`Schema`](crate::Schema), which can see the other types.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.name.is_empty() {
            return Err(SchemaError::EmptyName("object type"));
        }

        for (i, prop) in self.properties.iter().enumerate() {
            if prop.name.is_empty() {
                return Err(SchemaError::EmptyName("property"));
            }
            if self.properties[..i].iter().any(|p| p.name == prop.name) {
                return Err(SchemaError::DuplicateProperty {
                    object_type: self.name.clone(),
                    property: prop.name.clone(),
                });
            }
            if prop.optional && matches!(prop.property_type, PropertyType::List(_)) {
                return Err(SchemaError::OptionalList {
                    object_type: self.name.clone(),
                    property: prop.name.clone(),
                });
            }
            if let Some(default) = &prop.default {
                prop.property_type
                    .coerce(default.clone(), prop.is_nullable())
                    .map_err(|source| SchemaError::InvalidDefault {
                        object_type: self.name.clone(),
                        property: prop.name.clone(),
                        source,
                    })?;
            }
        }

        if let Some(pk) = &self.primary_key {
            let invalid = |reason: &str| SchemaError::InvalidPrimaryKey {
                object_type: self.name.clone(),
                property: pk.clone(),
                reason: reason.to_string(),
            };
            let prop = self.property(pk).ok_or_else(|| invalid("no such property"))?;
            if !prop.property_type.is_indexable_key() {
                return Err(invalid("only int and string properties can be primary keys"));
            }
            if prop.optional {
                return Err(invalid("primary keys cannot be optional"));
            }
        }

        Ok(())
    }
}
