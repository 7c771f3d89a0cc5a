//! Declarative schema descriptions.
//!
//! A [`SchemaDescriptor`] is the serde form of a schema, typically loaded from
//! JSON:
//!
//! ```json
//! {
//!   "types": [
//!     {
//!       "name": "Person",
//!       "primary_key": "name",
//!       "properties": [
//!         { "name": "name", "type": "string" },
//!         { "name": "age", "type": "int", "default": 0 },
//!         { "name": "dogs", "type": "list", "object_type": "Dog" }
//!       ]
//!     },
//!     { "name": "Dog", "properties": [{ "name": "name", "type": "string" }] }
//!   ]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vista_types::{PropertyType, TypeError, Value};

use crate::error::{SchemaError, SchemaResult};
use crate::object_schema::{ObjectSchema, Property};
use crate::schema::Schema;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub types: Vec<ObjectSchemaDescriptor>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectSchemaDescriptor {
    pub name: String,
    #[serde(default)]
    pub primary_key: Option<String>,
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl SchemaDescriptor {
    /// Decode a descriptor from JSON text.
    pub fn from_json(text: &str) -> SchemaResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert into a validated [`Schema`].
    pub fn into_schema(self) -> SchemaResult<Schema> {
        let types = self
            .types
            .into_iter()
            .map(ObjectSchemaDescriptor::into_object_schema)
            .collect::<SchemaResult<Vec<_>>>()?;
        Schema::new(types)
    }
}

impl ObjectSchemaDescriptor {
    fn into_object_schema(self) -> SchemaResult<ObjectSchema> {
        let mut properties = Vec::with_capacity(self.properties.len());
        for desc in self.properties {
            let invalid_type = |source: TypeError| SchemaError::InvalidType {
                object_type: self.name.clone(),
                property: desc.name.clone(),
                source,
            };
            let ty = PropertyType::parse(&desc.type_name, desc.object_type.as_deref())
                .map_err(invalid_type)?;

            let mut prop = Property::new(desc.name.clone(), ty);
            prop.optional = desc.optional;
            if let Some(json) = &desc.default {
                let value = json_to_value(&prop.property_type, json).map_err(|source| {
                    SchemaError::InvalidDefault {
                        object_type: self.name.clone(),
                        property: desc.name.clone(),
                        source,
                    }
                })?;
                prop.default = Some(value);
            }
            properties.push(prop);
        }

        let mut schema = ObjectSchema::new(self.name, properties);
        schema.primary_key = self.primary_key;
        Ok(schema)
    }
}

impl Schema {
    /// Load and validate a schema from its JSON description.
    pub fn from_json(text: &str) -> SchemaResult<Self> {
        SchemaDescriptor::from_json(text)?.into_schema()
    }
}

/// Interpret a JSON default according to the declared property type.
fn json_to_value(ty: &PropertyType, json: &serde_json::Value) -> Result<Value, TypeError> {
    use serde_json::Value as Json;

    let mismatch = || TypeError::Conversion {
        expected: ty.to_string(),
        found: json.to_string(),
    };

    let value = match (ty, json) {
        (_, Json::Null) => Value::Null,
        (PropertyType::Bool, Json::Bool(b)) => Value::Bool(*b),
        (PropertyType::Int, Json::Number(n)) => Value::Int(n.as_i64().ok_or_else(mismatch)?),
        (PropertyType::Float, Json::Number(n)) => {
            Value::Float(n.as_f64().ok_or_else(mismatch)? as f32)
        }
        (PropertyType::Double, Json::Number(n)) => Value::Double(n.as_f64().ok_or_else(mismatch)?),
        (PropertyType::String, Json::String(s)) => Value::String(s.clone()),
        (PropertyType::Date, Json::String(s)) => Value::Date(parse_date(s).ok_or_else(mismatch)?),
        (PropertyType::Data, Json::String(s)) => Value::Data(s.as_bytes().to_vec()),
        (PropertyType::Data, Json::Array(items)) => Value::Data(
            items
                .iter()
                .map(|i| i.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(mismatch)?,
        ),
        (PropertyType::Object(_), Json::Object(_)) => untyped(json),
        (PropertyType::List(_), Json::Array(items)) if items.iter().all(Json::is_object) => {
            untyped(json)
        }
        _ => return Err(mismatch()),
    };
    Ok(value)
}

/// Property values of a nested object, typed when the object is created.
fn untyped(json: &serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(untyped).collect()),
        Json::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), untyped(v))).collect()),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
