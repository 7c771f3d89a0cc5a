//! Predicate compilation.
//!
//! Grammar accepted by [`DefaultCompiler`], lowest precedence first:
//!
//! ```text
//! or         := and (("||" | OR) and)*
//! and        := unary (("&&" | AND) unary)*
//! unary      := ("!" | NOT) unary | primary
//! primary    := "(" or ")" | TRUEPREDICATE | FALSEPREDICATE | comparison
//! comparison := operand op ["[c]"] operand
//! op         := = | == | != | <> | < | <= | > | >= | BEGINSWITH | ENDSWITH | CONTAINS
//! operand    := keypath | literal | $n
//! literal    := number | 'string' | "string" | true | false | null | nil
//! ```
//!
//! Keywords are case-insensitive. Exactly one side of a comparison must be a
//! key path. The number of supplied arguments must match the highest `$n`
//! referenced, in both directions.

use tracing::debug;
use vista_schema::{ObjectSchema, Schema};
use vista_types::{PropertyType, Value};

use crate::error::{QueryError, QueryResult};
use crate::filter::{CompareOp, Filter, KeyPath, StringOp};
use crate::lexer::{tokenize, Token};

/// Turns predicate text into a [`Filter`] bound to one object type.
pub trait PredicateCompiler: Send + Sync {
    /// Compile `text` against `object_schema`, substituting `args` for
    /// `$0..$n`. `schema` resolves key paths through links.
    ///
    /// Every failure is reported as [`QueryError::InvalidPredicate`].
    fn compile(
        &self,
        text: &str,
        args: &[Value],
        object_schema: &ObjectSchema,
        schema: &Schema,
    ) -> QueryResult<Filter>;
}

/// The built-in predicate language.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCompiler;

impl PredicateCompiler for DefaultCompiler {
    fn compile(
        &self,
        text: &str,
        args: &[Value],
        object_schema: &ObjectSchema,
        schema: &Schema,
    ) -> QueryResult<Filter> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            args,
            referenced: 0,
            object_schema,
            schema,
        };
        let filter = parser.parse().map_err(|e| match e {
            QueryError::InvalidPredicate(_) => e,
            other => QueryError::InvalidPredicate(other.to_string()),
        })?;
        debug!(object_type = %object_schema.name, predicate = text, "compiled predicate");
        Ok(filter)
    }
}

enum Operand {
    Path(KeyPath),
    Value(Value),
}

enum Operator {
    Compare(CompareOp),
    Text(StringOp),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    args: &'a [Value],
    /// One past the highest `$n` seen.
    referenced: usize,
    object_schema: &'a ObjectSchema,
    schema: &'a Schema,
}

impl Parser<'_> {
    fn parse(&mut self) -> QueryResult<Filter> {
        if self.tokens.is_empty() {
            return Err(QueryError::invalid("empty predicate"));
        }
        let filter = self.or()?;
        if let Some(t) = self.peek() {
            return Err(QueryError::invalid(format!("unexpected {t:?} after predicate")));
        }
        if self.args.len() > self.referenced {
            return Err(QueryError::invalid(format!(
                "{} arguments supplied but the predicate uses {}",
                self.args.len(),
                self.referenced
            )));
        }
        Ok(filter)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn or(&mut self) -> QueryResult<Filter> {
        let mut left = self.and()?;
        while matches!(self.peek(), Some(Token::Or)) || self.peek_keyword("OR") {
            self.pos += 1;
            let right = self.and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> QueryResult<Filter> {
        let mut left = self.unary()?;
        while matches!(self.peek(), Some(Token::And)) || self.peek_keyword("AND") {
            self.pos += 1;
            let right = self.unary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> QueryResult<Filter> {
        if matches!(self.peek(), Some(Token::Not)) || self.peek_keyword("NOT") {
            self.pos += 1;
            return Ok(Filter::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> QueryResult<Filter> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.pos += 1;
            let inner = self.or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(QueryError::invalid("missing ')'")),
            };
        }
        if self.peek_keyword("TRUEPREDICATE") {
            self.pos += 1;
            return Ok(Filter::True);
        }
        if self.peek_keyword("FALSEPREDICATE") {
            self.pos += 1;
            return Ok(Filter::False);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> QueryResult<Filter> {
        let left = self.operand()?;
        let op = self.operator()?;
        let case_insensitive = matches!(self.peek(), Some(Token::CaseInsensitive));
        if case_insensitive {
            self.pos += 1;
        }
        let right = self.operand()?;

        let (path, value, op) = match (left, right) {
            (Operand::Path(p), Operand::Value(v)) => (p, v, op),
            (Operand::Value(v), Operand::Path(p)) => match op {
                Operator::Compare(c) => (p, v, Operator::Compare(c.flipped())),
                Operator::Text(_) => {
                    return Err(QueryError::invalid(
                        "the left side of a string operator must be a property",
                    ))
                }
            },
            (Operand::Path(a), Operand::Path(b)) => {
                return Err(QueryError::invalid(format!(
                    "comparing two properties ({a} and {b}) is not supported"
                )))
            }
            (Operand::Value(_), Operand::Value(_)) => {
                return Err(QueryError::invalid("a comparison needs a property"))
            }
        };

        check_operands(&path, &op, &value, case_insensitive)?;
        Ok(match op {
            Operator::Compare(op) => Filter::Compare {
                path,
                op,
                value,
                case_insensitive,
            },
            Operator::Text(op) => Filter::Text {
                path,
                op,
                pattern: value.as_str().unwrap_or_default().to_string(),
                case_insensitive,
            },
        })
    }

    fn operator(&mut self) -> QueryResult<Operator> {
        match self.next() {
            Some(Token::Compare(op)) => Ok(Operator::Compare(op)),
            Some(Token::Ident(word)) => StringOp::from_keyword(&word)
                .map(Operator::Text)
                .ok_or_else(|| QueryError::invalid(format!("unknown operator '{word}'"))),
            Some(other) => Err(QueryError::invalid(format!("expected an operator, found {other:?}"))),
            None => Err(QueryError::invalid("expected an operator")),
        }
    }

    fn operand(&mut self) -> QueryResult<Operand> {
        let token = self
            .next()
            .ok_or_else(|| QueryError::invalid("unexpected end of predicate"))?;
        let value = match token {
            Token::Int(i) => Value::Int(i),
            Token::Float(f) => Value::Double(f),
            Token::Str(s) => Value::String(s),
            Token::Arg(n) => {
                self.referenced = self.referenced.max(n + 1);
                self.arg(n)?
            }
            Token::Ident(word) => {
                if word.eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if word.eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else if word.eq_ignore_ascii_case("null") || word.eq_ignore_ascii_case("nil") {
                    Value::Null
                } else {
                    return self.key_path(word).map(Operand::Path);
                }
            }
            other => return Err(QueryError::invalid(format!("unexpected {other:?}"))),
        };
        Ok(Operand::Value(value))
    }

    fn arg(&self, n: usize) -> QueryResult<Value> {
        self.args.get(n).cloned().ok_or_else(|| {
            QueryError::invalid(format!(
                "argument ${n} was not supplied ({} given)",
                self.args.len()
            ))
        })
    }

    fn key_path(&mut self, first: String) -> QueryResult<KeyPath> {
        let mut names = vec![first];
        while matches!(self.peek(), Some(Token::Dot)) {
            self.pos += 1;
            match self.next() {
                Some(Token::Ident(name)) => names.push(name),
                _ => return Err(QueryError::invalid("expected a property name after '.'")),
            }
        }
        KeyPath::resolve(&names, self.object_schema, self.schema)
    }
}

/// Reject comparisons the property's type cannot support.
fn check_operands(
    path: &KeyPath,
    op: &Operator,
    value: &Value,
    case_insensitive: bool,
) -> QueryResult<()> {
    let ty = path.property_type();
    let bad = |what: &str| Err(QueryError::invalid(format!("{path} ({ty}): {what}")));

    if let PropertyType::List(_) = ty {
        return bad("list properties cannot be used in predicates");
    }

    match op {
        Operator::Text(_) => {
            if *ty != PropertyType::String {
                return bad("string operators need a string property");
            }
            if value.as_str().is_none() {
                return bad("string operators need a string operand");
            }
        }
        Operator::Compare(c) => {
            if case_insensitive && (*ty != PropertyType::String || !c.is_equality()) {
                return bad("[c] only applies to string equality and string operators");
            }
            if value.is_null() {
                if !c.is_equality() {
                    return bad("null can only be compared with == or !=");
                }
                return Ok(());
            }
            let compatible = match ty {
                PropertyType::Int | PropertyType::Float | PropertyType::Double => {
                    value.as_f64().is_some()
                }
                PropertyType::Bool => matches!(value, Value::Bool(_)) && c.is_equality(),
                PropertyType::String => matches!(value, Value::String(_)),
                PropertyType::Date => matches!(value, Value::Date(_)),
                PropertyType::Data => matches!(value, Value::Data(_)) && c.is_equality(),
                PropertyType::Object(_) => matches!(value, Value::Link(_)) && c.is_equality(),
                PropertyType::List(_) => false,
            };
            if !compatible {
                return bad(&format!("cannot compare with {} using {c}", value.type_name()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_schema::Property;
    use vista_store::Group;
    use vista_types::SchemaVersion;

    fn schema() -> Schema {
        let declared = Schema::new(vec![
            ObjectSchema::new("Dog", vec![Property::new("name", PropertyType::String)]),
            ObjectSchema::new(
                "Person",
                vec![
                    Property::new("name", PropertyType::String),
                    Property::new("age", PropertyType::Int),
                    Property::new("admin", PropertyType::Bool),
                    Property::new("dog", PropertyType::Object("Dog".into())),
                    Property::new("dogs", PropertyType::List("Dog".into())),
                ],
            ),
        ])
        .unwrap();
        Group::new()
            .bind(Some(&declared), SchemaVersion::new(0))
            .unwrap()
    }

    fn compile(text: &str, args: &[Value]) -> QueryResult<Filter> {
        let s = schema();
        DefaultCompiler.compile(text, args, s.get("Person").unwrap(), &s)
    }

    fn invalid(text: &str) -> bool {
        matches!(compile(text, &[]), Err(QueryError::InvalidPredicate(_)))
    }

    // -----------------------------------------------------------------------
    // Accepted forms
    // -----------------------------------------------------------------------

    #[test]
    fn simple_comparison() {
        match compile("age > 18", &[]).unwrap() {
            Filter::Compare { op, value, .. } => {
                assert_eq!(op, CompareOp::Gt);
                assert_eq!(value, Value::Int(18));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn literal_on_the_left_flips() {
        match compile("18 < age", &[]).unwrap() {
            Filter::Compare { op, .. } => assert_eq!(op, CompareOp::Gt),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn precedence_and_grouping() {
        let f = compile("name == 'a' || name == 'b' && age < 3", &[]).unwrap();
        assert!(matches!(f, Filter::Or(_, ref rhs) if matches!(**rhs, Filter::And(_, _))));

        let g = compile("(name == 'a' OR name == 'b') AND NOT age < 3", &[]).unwrap();
        assert!(matches!(g, Filter::And(ref lhs, ref rhs)
            if matches!(**lhs, Filter::Or(_, _)) && matches!(**rhs, Filter::Not(_))));
    }

    #[test]
    fn keywords_are_case_insensitive() {
        compile("admin == TRUE and name beginswith[c] 'x'", &[]).unwrap();
        assert_eq!(compile("truepredicate", &[]).unwrap(), Filter::True);
        assert_eq!(compile("FALSEPREDICATE", &[]).unwrap(), Filter::False);
    }

    #[test]
    fn arguments_substitute() {
        let f = compile("name = $1 && age >= $0", &[Value::Int(5), Value::from("Ann")]).unwrap();
        let Filter::And(lhs, rhs) = f else {
            panic!("expected conjunction")
        };
        assert!(matches!(*lhs, Filter::Compare { ref value, .. } if *value == Value::from("Ann")));
        assert!(matches!(*rhs, Filter::Compare { ref value, .. } if *value == Value::Int(5)));
    }

    #[test]
    fn argument_count_must_match() {
        assert!(invalid("age > $1"));
        compile("age > $1", &[Value::Int(1), Value::Int(2)]).unwrap();
        assert!(matches!(
            compile("age > $0", &[Value::Int(1), Value::Int(2)]),
            Err(QueryError::InvalidPredicate(_))
        ));
        assert!(matches!(
            compile("TRUEPREDICATE", &[Value::Int(1)]),
            Err(QueryError::InvalidPredicate(_))
        ));
    }

    #[test]
    fn link_paths_and_null() {
        compile("dog.name ENDSWITH 'x'", &[]).unwrap();
        compile("dog == null", &[]).unwrap();
        compile("dog != nil", &[]).unwrap();
    }

    // -----------------------------------------------------------------------
    // Rejected forms
    // -----------------------------------------------------------------------

    #[test]
    fn every_failure_is_invalid_predicate() {
        assert!(invalid(""));
        assert!(invalid("age >"));
        assert!(invalid("age > 1 age"));
        assert!(invalid("(age > 1"));
        assert!(invalid("height > 1"));
        assert!(invalid("age LIKE 1"));
        assert!(invalid("age > $0"));
        assert!(invalid("name == age"));
        assert!(invalid("1 == 1"));
    }

    #[test]
    fn type_checks() {
        assert!(invalid("age == 'old'"));
        assert!(invalid("name > 3"));
        assert!(invalid("admin < true"));
        assert!(invalid("age BEGINSWITH 'x'"));
        assert!(invalid("age ==[c] 1"));
        assert!(invalid("age < null"));
        assert!(invalid("dogs == null"));
        assert!(invalid("'x' CONTAINS name"));
    }
}
