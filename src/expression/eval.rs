//! Row-level expression evaluation.

use std::cmp::Ordering;

use serde_json::Value;

use super::{ComparisonOp, Expression};
use crate::catalog::{DataType, Row};
use crate::error::{Error, Result};
use crate::session::Context;

impl Expression {
    /// Evaluate against a single row.
    ///
    /// Aggregates cannot be evaluated per row; the group-by node drives
    /// their accumulators instead.
    pub fn eval(&self, ctx: &Context, row: &Row) -> Result<Value> {
        match self {
            Expression::Literal { value, .. } => Ok(value.clone()),

            Expression::GetField { index, .. } => {
                row.get(*index).cloned().ok_or(Error::FieldOutOfRange {
                    index: *index,
                    width: row.len(),
                })
            }

            Expression::UnresolvedColumn { .. }
            | Expression::UnresolvedFunction { .. }
            | Expression::Star => Err(Error::Unresolved(self.name())),

            Expression::Alias { child, .. } => child.eval(ctx, row),

            Expression::And(left, right) => {
                let l = truth(&left.eval(ctx, row)?)?;
                let r = truth(&right.eval(ctx, row)?)?;
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }

            Expression::Or(left, right) => {
                let l = truth(&left.eval(ctx, row)?)?;
                let r = truth(&right.eval(ctx, row)?)?;
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }

            Expression::Not(child) => Ok(match truth(&child.eval(ctx, row)?)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),

            Expression::IsNull(child) => Ok(Value::Bool(child.eval(ctx, row)?.is_null())),

            Expression::Comparison { op, left, right } => {
                let l = left.eval(ctx, row)?;
                let r = right.eval(ctx, row)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }

                let ordering = comparison_type(left, right).compare(&l, &r)?;
                Ok(Value::Bool(match op {
                    ComparisonOp::Equals => ordering == Ordering::Equal,
                    ComparisonOp::NotEquals => ordering != Ordering::Equal,
                    ComparisonOp::LessThan => ordering == Ordering::Less,
                    ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
                    ComparisonOp::GreaterThan => ordering == Ordering::Greater,
                    ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
                }))
            }

            Expression::Like { expr, pattern } => {
                let value = expr.eval(ctx, row)?;
                let pattern = pattern.eval(ctx, row)?;
                match (&value, &pattern) {
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (Value::String(s), Value::String(p)) => Ok(Value::Bool(like_match(s, p))),
                    (Value::String(_), other) | (other, _) => {
                        Err(Error::type_mismatch(DataType::Text.sql_name(), other))
                    }
                }
            }

            Expression::DatePart { part, child } => {
                let value = child.eval(ctx, row)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::from(part.extract(&value)?))
            }

            Expression::Aggregate { .. } => Err(Error::Internal(format!(
                "aggregate {} evaluated outside of a group",
                self.name()
            ))),
        }
    }
}

/// Interpret a value as a SQL truth value. NULL is unknown.
fn truth(value: &Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => Ok(Some(n.as_f64().is_some_and(|f| f != 0.0))),
        other => Err(Error::type_mismatch(DataType::Boolean.sql_name(), other)),
    }
}

/// Dates and timestamps compare chronologically against either side.
fn comparison_type(left: &Expression, right: &Expression) -> DataType {
    match (left.data_type(), right.data_type()) {
        (t @ (DataType::Timestamp | DataType::Date), _) => t,
        (_, t @ (DataType::Timestamp | DataType::Date)) => t,
        (t, _) => t,
    }
}

/// Case-insensitive LIKE matching. `%` matches any sequence, `_` one char.
pub(crate) fn like_match(s: &str, pattern: &str) -> bool {
    let s: Vec<char> = s.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    match_like(&s, &p, 0, 0)
}

fn match_like(s: &[char], p: &[char], si: usize, pi: usize) -> bool {
    if pi >= p.len() {
        return si >= s.len();
    }

    match p[pi] {
        '%' => (si..=s.len()).any(|i| match_like(s, p, i, pi + 1)),
        '_' => si < s.len() && match_like(s, p, si + 1, pi + 1),
        c => {
            si < s.len()
                && s[si].to_lowercase().eq(c.to_lowercase())
                && match_like(s, p, si + 1, pi + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::DatePart;
    use serde_json::json;

    fn lit(v: Value) -> Expression {
        match v {
            Value::Null => Expression::Literal {
                value: Value::Null,
                data_type: DataType::Boolean,
            },
            v => Expression::literal(v),
        }
    }

    fn eval(e: &Expression) -> Value {
        e.eval(&Context::default(), &vec![]).unwrap()
    }

    #[test]
    fn test_and_truth_table() {
        let cases = [
            (json!(true), json!(true), json!(true)),
            (json!(true), json!(false), json!(false)),
            (json!(true), json!(null), json!(null)),
            (json!(false), json!(true), json!(false)),
            (json!(false), json!(false), json!(false)),
            (json!(false), json!(null), json!(false)),
            (json!(null), json!(true), json!(null)),
            (json!(null), json!(false), json!(false)),
            (json!(null), json!(null), json!(null)),
        ];
        for (l, r, expected) in cases {
            let e = Expression::and(lit(l.clone()), lit(r.clone()));
            assert_eq!(eval(&e), expected, "{} AND {}", l, r);
        }
    }

    #[test]
    fn test_or_truth_table() {
        let cases = [
            (json!(true), json!(true), json!(true)),
            (json!(true), json!(false), json!(true)),
            (json!(true), json!(null), json!(true)),
            (json!(false), json!(true), json!(true)),
            (json!(false), json!(false), json!(false)),
            (json!(false), json!(null), json!(null)),
            (json!(null), json!(true), json!(true)),
            (json!(null), json!(false), json!(null)),
            (json!(null), json!(null), json!(null)),
        ];
        for (l, r, expected) in cases {
            let e = Expression::or(lit(l.clone()), lit(r.clone()));
            assert_eq!(eval(&e), expected, "{} OR {}", l, r);
        }
    }

    #[test]
    fn test_not() {
        assert_eq!(eval(&Expression::not(lit(json!(true)))), json!(false));
        assert_eq!(eval(&Expression::not(lit(json!(null)))), json!(null));
    }

    #[test]
    fn test_is_null() {
        let field = Expression::get_field(0, DataType::Text, "s", true);
        let e = Expression::is_null(field);
        let ctx = Context::default();
        assert_eq!(e.eval(&ctx, &vec![json!(null)]).unwrap(), json!(true));
        assert_eq!(e.eval(&ctx, &vec![json!("x")]).unwrap(), json!(false));
    }

    #[test]
    fn test_get_field_out_of_range() {
        let e = Expression::get_field(3, DataType::Text, "s", false);
        assert!(matches!(
            e.eval(&Context::default(), &vec![json!("a")]),
            Err(Error::FieldOutOfRange { index: 3, width: 1 })
        ));
    }

    #[test]
    fn test_unresolved_cannot_be_evaluated() {
        let ctx = Context::default();
        assert!(matches!(
            Expression::column("a").eval(&ctx, &vec![]),
            Err(Error::Unresolved(_))
        ));
        assert!(matches!(Expression::Star.eval(&ctx, &vec![]), Err(Error::Unresolved(_))));
    }

    #[test]
    fn test_comparisons() {
        let row = vec![json!("John Doe"), json!(30), json!(null)];
        let ctx = Context::default();
        let name = Expression::get_field(0, DataType::Text, "name", false);
        let age = Expression::get_field(1, DataType::Int32, "age", false);
        let missing = Expression::get_field(2, DataType::Int32, "missing", true);

        let e = Expression::equals(name, Expression::literal(json!("John Doe")));
        assert_eq!(e.eval(&ctx, &row).unwrap(), json!(true));

        let e = Expression::comparison(
            ComparisonOp::GreaterThanOrEqual,
            age.clone(),
            Expression::literal(json!(30)),
        );
        assert_eq!(e.eval(&ctx, &row).unwrap(), json!(true));

        let e = Expression::comparison(ComparisonOp::LessThan, age, missing);
        assert_eq!(e.eval(&ctx, &row).unwrap(), json!(null));
    }

    #[test]
    fn test_timestamp_comparison_parses_literals() {
        let ts = Expression::get_field(0, DataType::Timestamp, "ts", false);
        let e = Expression::comparison(
            ComparisonOp::GreaterThan,
            ts,
            Expression::literal(json!("2018-01-01 00:00:00")),
        );
        let ctx = Context::default();
        assert_eq!(e.eval(&ctx, &vec![json!("2018-06-01T00:00:00Z")]).unwrap(), json!(true));
    }

    #[test]
    fn test_like() {
        assert!(like_match("Alice", "A%"));
        assert!(like_match("Alice", "%ICE"));
        assert!(like_match("Alice", "A____"));
        assert!(!like_match("Alice", "B%"));

        let e = Expression::like(Expression::literal(json!("john@doe.com")), lit(json!("%@doe.com")));
        assert_eq!(eval(&e), json!(true));
        let e = Expression::like(lit(json!(null)), lit(json!("%")));
        assert_eq!(eval(&e), json!(null));
    }

    #[test]
    fn test_date_part_null_and_mismatch() {
        let ctx = Context::default();
        let e = Expression::date_part(DatePart::Year, lit(json!(null)));
        assert_eq!(e.eval(&ctx, &vec![]).unwrap(), json!(null));

        let e = Expression::date_part(DatePart::Year, Expression::literal(json!("not a date")));
        assert!(matches!(e.eval(&ctx, &vec![]), Err(Error::TypeMismatch { .. })));
    }
}
