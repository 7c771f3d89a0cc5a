use std::cmp::Ordering;
use std::fmt;

use vista_schema::{ObjectSchema, Schema};
use vista_store::{Group, Table};
use vista_types::{ColumnId, ObjectKey, PropertyType, Value};

use crate::error::{QueryError, QueryResult};

const NULL: &Value = &Value::Null;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// The operator with its operands swapped: `5 < age` is `age > 5`.
    pub fn flipped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    fn holds(self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (Self::Eq, Some(o)) => o.is_eq(),
            (Self::Ne, Some(o)) => o.is_ne(),
            (Self::Ne, None) => true,
            (Self::Lt, Some(o)) => o.is_lt(),
            (Self::Le, Some(o)) => o.is_le(),
            (Self::Gt, Some(o)) => o.is_gt(),
            (Self::Ge, Some(o)) => o.is_ge(),
            _ => false,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringOp {
    BeginsWith,
    EndsWith,
    Contains,
}

impl StringOp {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "BEGINSWITH" => Some(Self::BeginsWith),
            "ENDSWITH" => Some(Self::EndsWith),
            "CONTAINS" => Some(Self::Contains),
            _ => None,
        }
    }

    fn holds(self, haystack: &str, needle: &str) -> bool {
        match self {
            Self::BeginsWith => haystack.starts_with(needle),
            Self::EndsWith => haystack.ends_with(needle),
            Self::Contains => haystack.contains(needle),
        }
    }
}

/// One hop of a key path: a column of `table`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathStep {
    pub table: String,
    pub name: String,
    pub column: ColumnId,
}

/// A property reached from the queried type, possibly through object links.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPath {
    steps: Vec<PathStep>,
    property_type: PropertyType,
}

impl KeyPath {
    /// Resolve dotted `names` starting at `object_schema`.
    ///
    /// Every hop but the last must be an object link. Fails with
    /// `UnknownProperty` for a name the type does not declare and with
    /// `InvalidPredicate` for a hop through a non-link property.
    pub fn resolve<S: AsRef<str>>(
        names: &[S],
        object_schema: &ObjectSchema,
        schema: &Schema,
    ) -> QueryResult<Self> {
        let mut current = object_schema;
        let mut steps = Vec::with_capacity(names.len());
        let mut property_type = None;

        for (i, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let prop = current
                .property(name)
                .ok_or_else(|| QueryError::UnknownProperty {
                    object_type: current.name.clone(),
                    property: name.to_string(),
                })?;
            steps.push(PathStep {
                table: current.name.clone(),
                name: name.to_string(),
                column: prop.column,
            });

            if i + 1 < names.len() {
                let PropertyType::Object(target) = &prop.property_type else {
                    return Err(QueryError::invalid(format!(
                        "{}.{name} is not an object link and cannot be traversed",
                        current.name
                    )));
                };
                current = schema
                    .get(target)
                    .ok_or_else(|| QueryError::UnknownType(target.clone()))?;
            }
            property_type = Some(prop.property_type.clone());
        }

        let property_type =
            property_type.ok_or_else(|| QueryError::invalid("empty key path"))?;
        Ok(Self {
            steps,
            property_type,
        })
    }

    /// Declared type of the final property.
    pub fn property_type(&self) -> &PropertyType {
        &self.property_type
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn columns(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.steps.iter().map(|s| s.column)
    }

    /// Follow the path from row `key` of `base`. A null link anywhere on the
    /// way yields `Null`; `None` means the row or a table is gone.
    pub fn value<'g>(&self, group: &'g Group, base: &'g Table, key: ObjectKey) -> Option<&'g Value> {
        let mut table = base;
        let mut key = key;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                table = group.table(&step.table)?;
            }
            let value = table.get(key, step.column)?;
            if i + 1 == self.steps.len() {
                return Some(value);
            }
            match value {
                Value::Link(next) => key = *next,
                _ => return Some(NULL),
            }
        }
        None
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&step.name)?;
        }
        Ok(())
    }
}

/// A compiled predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    True,
    False,
    Compare {
        path: KeyPath,
        op: CompareOp,
        value: Value,
        case_insensitive: bool,
    },
    Text {
        path: KeyPath,
        op: StringOp,
        pattern: String,
        case_insensitive: bool,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Conjunction, folding away `True`.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::True, f) | (f, Filter::True) => f,
            (a, b) => Filter::And(Box::new(a), Box::new(b)),
        }
    }

    /// Evaluate against row `key` of `table`.
    pub fn matches(&self, group: &Group, table: &Table, key: ObjectKey) -> bool {
        match self {
            Filter::True => true,
            Filter::False => false,
            Filter::Compare {
                path,
                op,
                value,
                case_insensitive,
            } => {
                let actual = path.value(group, table, key).unwrap_or(NULL);
                compare(actual, *op, value, *case_insensitive)
            }
            Filter::Text {
                path,
                op,
                pattern,
                case_insensitive,
            } => match path.value(group, table, key).and_then(Value::as_str) {
                Some(s) if *case_insensitive => {
                    op.holds(&s.to_lowercase(), &pattern.to_lowercase())
                }
                Some(s) => op.holds(s, pattern),
                None => false,
            },
            Filter::And(a, b) => a.matches(group, table, key) && b.matches(group, table, key),
            Filter::Or(a, b) => a.matches(group, table, key) || b.matches(group, table, key),
            Filter::Not(f) => !f.matches(group, table, key),
        }
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value, case_insensitive: bool) -> bool {
    if case_insensitive {
        if let (Some(a), Some(b)) = (actual.as_str(), expected.as_str()) {
            return op.holds(Some(a.to_lowercase().cmp(&b.to_lowercase())));
        }
    }
    if actual.is_null() || expected.is_null() {
        let equal = actual.is_null() && expected.is_null();
        return match op {
            CompareOp::Eq => equal,
            CompareOp::Ne => !equal,
            _ => false,
        };
    }
    op.holds(actual.query_cmp(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_schema::Property;
    use vista_types::SchemaVersion;

    struct Fixture {
        group: Group,
        schema: Schema,
        keys: Vec<ObjectKey>,
    }

    fn fixture() -> Fixture {
        let declared = Schema::new(vec![
            ObjectSchema::new("Dog", vec![Property::new("name", PropertyType::String)]),
            ObjectSchema::new(
                "Person",
                vec![
                    Property::new("name", PropertyType::String),
                    Property::new("age", PropertyType::Int).optional(),
                    Property::new("dog", PropertyType::Object("Dog".into())),
                ],
            ),
        ])
        .unwrap();
        let mut group = Group::new();
        let schema = group.bind(Some(&declared), SchemaVersion::new(0)).unwrap();
        let rex = group
            .require_table_mut("Dog")
            .unwrap()
            .insert(vec![Value::from("Rex")])
            .unwrap();
        let people = group.require_table_mut("Person").unwrap();
        let keys = vec![
            people
                .insert(vec![Value::from("Ann"), Value::Int(30), Value::Link(rex)])
                .unwrap(),
            people
                .insert(vec![Value::from("bob"), Value::Null, Value::Null])
                .unwrap(),
        ];
        Fixture {
            group,
            schema,
            keys,
        }
    }

    fn path(f: &Fixture, names: &[&str]) -> KeyPath {
        KeyPath::resolve(names, f.schema.get("Person").unwrap(), &f.schema).unwrap()
    }

    fn eval(f: &Fixture, filter: &Filter) -> Vec<bool> {
        let table = f.group.table("Person").unwrap();
        f.keys
            .iter()
            .map(|k| filter.matches(&f.group, table, *k))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Key paths
    // -----------------------------------------------------------------------

    #[test]
    fn resolves_through_links() {
        let f = fixture();
        let p = path(&f, &["dog", "name"]);
        assert_eq!(p.steps().len(), 2);
        assert_eq!(p.property_type(), &PropertyType::String);
        assert_eq!(p.to_string(), "dog.name");
    }

    #[test]
    fn rejects_unknown_and_non_link_hops() {
        let f = fixture();
        let person = f.schema.get("Person").unwrap();
        assert!(matches!(
            KeyPath::resolve(&["height"], person, &f.schema),
            Err(QueryError::UnknownProperty { .. })
        ));
        assert!(matches!(
            KeyPath::resolve(&["name", "length"], person, &f.schema),
            Err(QueryError::InvalidPredicate(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    #[test]
    fn comparisons_and_nulls() {
        let f = fixture();
        let age = |op, value| Filter::Compare {
            path: path(&f, &["age"]),
            op,
            value,
            case_insensitive: false,
        };
        assert_eq!(eval(&f, &age(CompareOp::Gt, Value::Int(18))), vec![true, false]);
        assert_eq!(eval(&f, &age(CompareOp::Eq, Value::Null)), vec![false, true]);
        assert_eq!(eval(&f, &age(CompareOp::Ne, Value::Null)), vec![true, false]);
        assert_eq!(eval(&f, &age(CompareOp::Le, Value::Double(30.0))), vec![true, false]);
    }

    #[test]
    fn link_paths_through_null_are_null() {
        let f = fixture();
        let dog_name = Filter::Compare {
            path: path(&f, &["dog", "name"]),
            op: CompareOp::Eq,
            value: Value::from("Rex"),
            case_insensitive: false,
        };
        assert_eq!(eval(&f, &dog_name), vec![true, false]);
    }

    #[test]
    fn string_operators() {
        let f = fixture();
        let text = |op, pattern: &str, ci| Filter::Text {
            path: path(&f, &["name"]),
            op,
            pattern: pattern.into(),
            case_insensitive: ci,
        };
        assert_eq!(eval(&f, &text(StringOp::BeginsWith, "A", false)), vec![true, false]);
        assert_eq!(eval(&f, &text(StringOp::BeginsWith, "B", true)), vec![false, true]);
        assert_eq!(eval(&f, &text(StringOp::Contains, "o", false)), vec![false, true]);
        assert_eq!(eval(&f, &text(StringOp::EndsWith, "NN", true)), vec![true, false]);
    }

    #[test]
    fn boolean_composition() {
        let f = fixture();
        let is_ann = Filter::Compare {
            path: path(&f, &["name"]),
            op: CompareOp::Eq,
            value: Value::from("ann"),
            case_insensitive: true,
        };
        assert_eq!(eval(&f, &is_ann), vec![true, false]);
        let not_ann = Filter::Not(Box::new(is_ann.clone()));
        assert_eq!(eval(&f, &not_ann), vec![false, true]);
        assert_eq!(
            eval(&f, &Filter::Or(Box::new(is_ann.clone()), Box::new(not_ann))),
            vec![true, true]
        );
        assert_eq!(eval(&f, &Filter::True.and(Filter::False)), vec![false, false]);
        assert_eq!(Filter::True.and(is_ann.clone()), is_ann);
    }
}
