//! Property values.
//!
//! [`Value`] is the unit stored in a row slot and the unit passed as a bound
//! predicate argument. Two orderings are defined:
//!
//! - [`Value::sort_cmp`] is a total order used by sort descriptors. Nulls sort
//!   first, numbers compare numerically across `Int`/`Float`/`Double`, and
//!   values of unrelated types order by a fixed type rank.
//! - [`Value::query_cmp`] is the partial order used by predicate comparisons.
//!   It returns `None` when the two values are not comparable, which makes
//!   the comparison false rather than an error.
//!
//! `Object` and `Array` describe objects that do not exist yet. They are
//! accepted when creating or assigning link properties and are replaced by
//! `Link` and `List` before anything reaches a table.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::key::ObjectKey;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Data(Vec<u8>),
    Link(ObjectKey),
    List(Vec<ObjectKey>),
    /// Property values of an object to create along with its parent.
    Object(BTreeMap<String, Value>),
    /// Elements for a list property: `Link` or `Object` values.
    Array(Vec<Value>),
}

impl Value {
    /// An object to create from property name and value pairs.
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Object(properties.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the value's variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Data(_) => "data",
            Value::Link(_) => "link",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of `Int`, `Float` and `Double` values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(f64::from(*f)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Value::Data(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<ObjectKey> {
        match self {
            Value::Link(k) => Some(*k),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ObjectKey]> {
        match self {
            Value::List(keys) => Some(keys),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Double(_))
    }

    /// Rank used to order values of unrelated types. Numbers share a rank.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) | Value::Double(_) => 2,
            Value::String(_) => 3,
            Value::Date(_) => 4,
            Value::Data(_) => 5,
            Value::Link(_) => 6,
            Value::List(_) => 7,
            Value::Object(_) => 8,
            Value::Array(_) => 9,
        }
    }

    /// Total order for sorting.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        if let Some(ord) = self.query_cmp(other) {
            return ord;
        }
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            _ if self.is_numeric() && other.is_numeric() => {
                // Only reachable when a NaN is involved: NaN sorts last.
                let (a, b) = (self.as_f64().unwrap_or(f64::NAN), other.as_f64().unwrap_or(f64::NAN));
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => Ordering::Equal,
                }
            }
            (Value::List(a), Value::List(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b)
                    .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| va.sort_cmp(vb)))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            }),
            (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()).then_with(|| {
                a.iter()
                    .zip(b)
                    .map(|(x, y)| x.sort_cmp(y))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            }),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    /// Partial order for predicate comparisons.
    ///
    /// Returns `None` for `Null` operands, mismatched types, NaN, lists and
    /// unsaved objects.
    pub fn query_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ if self.is_numeric() && other.is_numeric() => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Data(a), Value::Data(b)) => Some(a.cmp(b)),
            (Value::Link(a), Value::Link(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality as seen by predicates: numeric values compare by magnitude,
    /// `Null` equals only `Null`.
    pub fn query_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.query_cmp(other) == Some(Ordering::Equal),
        }
    }

    /// Render this value as JSON for display and export.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => Json::from(f64::from(*f)),
            Value::Double(d) => Json::from(*d),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_rfc3339()),
            Value::Data(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
            Value::Link(k) => Json::from(k.get()),
            Value::List(keys) => Json::Array(keys.iter().map(|k| Json::from(k.get())).collect()),
            Value::Object(properties) => Json::Object(
                properties
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect(),
            ),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Double(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Value::Data(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Link(k) => write!(f, "@{k}"),
            Value::List(keys) => write!(f, "[{} links]", keys.len()),
            Value::Object(properties) => write!(f, "{{{} properties}}", properties.len()),
            Value::Array(items) => write!(f, "[{} values]", items.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Data(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl From<ObjectKey> for Value {
    fn from(v: ObjectKey) -> Self {
        Value::Link(v)
    }
}

impl From<Vec<ObjectKey>> for Value {
    fn from(v: Vec<ObjectKey>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Object(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn nulls_sort_first() {
        assert_eq!(Value::Null.sort_cmp(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::from("a").sort_cmp(&Value::Null), Ordering::Greater);
        assert_eq!(Value::Null.sort_cmp(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert_eq!(Value::Int(2).sort_cmp(&Value::Double(1.5)), Ordering::Greater);
        assert_eq!(Value::Float(2.0).query_cmp(&Value::Int(2)), Some(Ordering::Equal));
        assert!(Value::Int(2).query_eq(&Value::Double(2.0)));
    }

    #[test]
    fn nan_sorts_last() {
        assert_eq!(Value::Double(f64::NAN).sort_cmp(&Value::Double(1.0)), Ordering::Greater);
        assert_eq!(Value::Double(1.0).sort_cmp(&Value::Double(f64::NAN)), Ordering::Less);
        assert_eq!(Value::Double(f64::NAN).query_cmp(&Value::Double(1.0)), None);
    }

    #[test]
    fn unrelated_types_are_not_query_comparable() {
        assert_eq!(Value::from("1").query_cmp(&Value::Int(1)), None);
        assert!(!Value::Null.query_eq(&Value::Int(0)));
        assert!(Value::Null.query_eq(&Value::Null));
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String("x".into()));
    }

    #[test]
    fn json_rendering() {
        assert_eq!(Value::Int(3).to_json(), serde_json::json!(3));
        assert_eq!(Value::from("a").to_json(), serde_json::json!("a"));
        assert_eq!(Value::Null.to_json(), serde_json::Value::Null);
        let nested = Value::from(vec![Value::object([("doubleCol", Value::Double(2.0))])]);
        assert_eq!(nested.to_json(), serde_json::json!([{ "doubleCol": 2.0 }]));
    }

    #[test]
    fn unsaved_objects_are_not_query_comparable() {
        let a = Value::object([("x", Value::Int(1))]);
        assert_eq!(a.query_cmp(&a), None);
        assert_eq!(a.sort_cmp(&a.clone()), Ordering::Equal);
        assert_eq!(a.to_string(), "{1 properties}");
        assert_eq!(a.type_name(), "object");
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e9f64..1.0e9).prop_map(Value::Double),
            "[a-z]{0,8}".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..4).prop_map(Value::Data),
            ("[a-z]{1,4}", any::<i64>()).prop_map(|(k, v)| Value::object([(k, Value::Int(v))])),
        ]
    }

    proptest! {
        #[test]
        fn sort_cmp_is_antisymmetric(a in arb_value(), b in arb_value()) {
            prop_assert_eq!(a.sort_cmp(&b), b.sort_cmp(&a).reverse());
        }

        #[test]
        fn sort_cmp_is_reflexive(a in arb_value()) {
            prop_assert_eq!(a.sort_cmp(&a), Ordering::Equal);
        }

        #[test]
        fn sorting_is_consistent_with_query_order(a in any::<i64>(), b in any::<i64>()) {
            let (va, vb) = (Value::Int(a), Value::Int(b));
            prop_assert_eq!(va.sort_cmp(&vb), a.cmp(&b));
            prop_assert_eq!(va.query_cmp(&vb), Some(a.cmp(&b)));
        }
    }
}
