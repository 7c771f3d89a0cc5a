use std::sync::Arc;

use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::object_schema::ObjectSchema;

/// A validated, ordered set of object schemas.
///
/// Object schemas are held behind `Arc` so result views and objects can keep
/// a cheap reference to the schema they were bound against.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    types: Vec<Arc<ObjectSchema>>,
}

impl Schema {
    /// Validate and wrap a list of object schemas.
    ///
    /// Checks every type on its own, then the cross-type rules: type names are
    /// unique and every link property targets a type in the list.
    pub fn new(types: Vec<ObjectSchema>) -> SchemaResult<Self> {
        for (i, ty) in types.iter().enumerate() {
            ty.validate()?;
            if types[..i].iter().any(|t| t.name == ty.name) {
                return Err(SchemaError::DuplicateType(ty.name.clone()));
            }
        }

        for ty in &types {
            for prop in &ty.properties {
                if let Some(target) = prop.property_type.target() {
                    if !types.iter().any(|t| t.name == target) {
                        return Err(SchemaError::UnknownLinkTarget {
                            object_type: ty.name.clone(),
                            property: prop.name.clone(),
                            target: target.to_string(),
                        });
                    }
                }
            }
        }

        debug!(types = types.len(), "schema validated");
        Ok(Self {
            types: types.into_iter().map(Arc::new).collect(),
        })
    }

    /// The empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up an object schema by type name.
    pub fn get(&self, name: &str) -> Option<&Arc<ObjectSchema>> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ObjectSchema>> {
        self.types.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns `true` if both schemas declare the same types and properties,
    /// ignoring column assignments and declaration order of types.
    pub fn same_shape(&self, other: &Schema) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.types.iter().all(|ty| {
            other.get(&ty.name).is_some_and(|o| {
                o.primary_key == ty.primary_key
                    && o.properties.len() == ty.properties.len()
                    && o.properties.iter().zip(&ty.properties).all(|(a, b)| {
                        a.name == b.name
                            && a.property_type == b.property_type
                            && a.optional == b.optional
                    })
            })
        })
    }

    /// Owned copies of the object schemas, in declaration order.
    pub fn to_vec(&self) -> Vec<ObjectSchema> {
        self.types.iter().map(|t| ObjectSchema::clone(t)).collect()
    }
}
