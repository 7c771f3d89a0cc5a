use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::Value;

/// Declared type of a property.
///
/// `Object` and `List` carry the name of the type they link to. Object
/// links are always nullable; list properties are never null (an empty list
/// is the absence of links).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Bool,
    Int,
    Float,
    Double,
    String,
    Date,
    Data,
    Object(String),
    List(String),
}

impl PropertyType {
    /// Parse a declarative type name.
    ///
    /// Primitive names are matched case-insensitively. `"object"` and
    /// `"list"` require `object_type`. Any other name is taken to be the name
    /// of a linked type, so `"Person"` is shorthand for an object link to
    /// `Person`.
    pub fn parse(type_name: &str, object_type: Option<&str>) -> Result<Self, TypeError> {
        let lowered = type_name.to_ascii_lowercase();
        let ty = match lowered.as_str() {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "float" => Self::Float,
            "double" => Self::Double,
            "string" => Self::String,
            "date" => Self::Date,
            "data" => Self::Data,
            "object" => Self::Object(Self::require_target(type_name, object_type)?),
            "list" => Self::List(Self::require_target(type_name, object_type)?),
            "" => return Err(TypeError::UnknownPropertyType(type_name.to_string())),
            _ => Self::Object(type_name.to_string()),
        };
        Ok(ty)
    }

    fn require_target(type_name: &str, object_type: Option<&str>) -> Result<String, TypeError> {
        match object_type {
            Some(t) if !t.is_empty() => Ok(t.to_string()),
            _ => Err(TypeError::UnknownPropertyType(format!(
                "{type_name} without an object type"
            ))),
        }
    }

    /// Name of the linked type for `Object` and `List` properties.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Object(t) | Self::List(t) => Some(t),
            _ => None,
        }
    }

    /// Returns `true` for `Object` and `List` properties.
    pub fn is_link(&self) -> bool {
        self.target().is_some()
    }

    /// Returns `true` if values of this type can be used as a primary key.
    pub fn is_indexable_key(&self) -> bool {
        matches!(self, Self::Int | Self::String)
    }

    /// The value a freshly added column is filled with for existing rows.
    pub fn zero_value(&self, optional: bool) -> Value {
        if optional {
            return Value::Null;
        }
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
            Self::Date => Value::Date(chrono::DateTime::<chrono::Utc>::default()),
            Self::Data => Value::Data(Vec::new()),
            Self::Object(_) => Value::Null,
            Self::List(_) => Value::List(Vec::new()),
        }
    }

    /// Check `value` against this type, applying the permitted widenings.
    ///
    /// `Int` widens to `Float` and `Double`, `Double` narrows to `Float`.
    /// `Null` is accepted for optional properties and object links. Whether a
    /// link points at a live row is checked by the store, not here.
    pub fn coerce(&self, value: Value, optional: bool) -> Result<Value, TypeError> {
        let coerced = match (self, value) {
            (_, Value::Null) if optional || matches!(self, Self::Object(_)) => Value::Null,
            (Self::Bool, v @ Value::Bool(_)) => v,
            (Self::Int, v @ Value::Int(_)) => v,
            (Self::Float, v @ Value::Float(_)) => v,
            (Self::Float, Value::Double(d)) => Value::Float(d as f32),
            (Self::Float, Value::Int(i)) => Value::Float(i as f32),
            (Self::Double, v @ Value::Double(_)) => v,
            (Self::Double, Value::Float(f)) => Value::Double(f64::from(f)),
            (Self::Double, Value::Int(i)) => Value::Double(i as f64),
            (Self::String, v @ Value::String(_)) => v,
            (Self::Date, v @ Value::Date(_)) => v,
            (Self::Data, v @ Value::Data(_)) => v,
            (Self::Object(_), v @ Value::Link(_)) => v,
            (Self::List(_), v @ Value::List(_)) => v,
            (Self::Object(_), v @ Value::Object(_)) => v,
            (Self::List(_), Value::Array(items)) => {
                if let Some(bad) = items
                    .iter()
                    .find(|item| !matches!(item, Value::Link(_) | Value::Object(_)))
                {
                    return Err(TypeError::Conversion {
                        expected: self.to_string(),
                        found: format!("array of {}", bad.type_name()),
                    });
                }
                Value::Array(items)
            }
            (_, other) => {
                return Err(TypeError::Conversion {
                    expected: self.to_string(),
                    found: other.type_name().to_string(),
                })
            }
        };
        Ok(coerced)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::String => write!(f, "string"),
            Self::Date => write!(f, "date"),
            Self::Data => write!(f, "data"),
            Self::Object(t) => write!(f, "object<{t}>"),
            Self::List(t) => write!(f, "list<{t}>"),
        }
    }
}
