//! Creation-time defaults.
//!
//! When an object is created with some properties omitted, the omitted ones
//! are filled from, in order of precedence:
//!
//! 1. the output of the type's [`ObjectFactory`], if one is registered;
//! 2. the property's declared default;
//! 3. `Null` for nullable properties, an empty list for list properties.
//!
//! Anything still missing is an error raised by the session.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use vista_types::Value;

use crate::object_schema::ObjectSchema;

/// Property name to default value.
pub type ObjectDefaults = BTreeMap<String, Value>;

/// Computes defaults for one object type at each creation.
pub type ObjectFactory = Arc<dyn Fn(&ObjectSchema) -> ObjectDefaults + Send + Sync>;

/// Per-type factories registered on a session.
#[derive(Clone, Default)]
pub struct DefaultsRegistry {
    factories: HashMap<String, ObjectFactory>,
}

impl DefaultsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `object_type`.
    pub fn register(&mut self, object_type: impl Into<String>, factory: ObjectFactory) {
        self.factories.insert(object_type.into(), factory);
    }

    /// Remove the factory for `object_type`. Returns `true` if one existed.
    pub fn unregister(&mut self, object_type: &str) -> bool {
        self.factories.remove(object_type).is_some()
    }

    pub fn has_factory(&self, object_type: &str) -> bool {
        self.factories.contains_key(object_type)
    }

    /// Resolve the defaults for one creation of `schema`.
    ///
    /// Factory output takes precedence over declared defaults. Factory
    /// entries naming properties the type does not have are dropped.
    pub fn defaults_for(&self, schema: &ObjectSchema) -> ObjectDefaults {
        let mut defaults: ObjectDefaults = schema
            .properties
            .iter()
            .filter_map(|p| p.default.clone().map(|v| (p.name.clone(), v)))
            .collect();

        if let Some(factory) = self.factories.get(&schema.name) {
            for (name, value) in factory(schema) {
                if schema.property(&name).is_some() {
                    defaults.insert(name, value);
                }
            }
        }

        defaults
    }
}

impl fmt::Debug for DefaultsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("DefaultsRegistry")
            .field("factories", &types)
            .finish()
    }
}
