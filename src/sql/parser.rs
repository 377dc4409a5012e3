//! SQL parser implementation.
//!
//! Converts SQL strings to unresolved plan trees using sqlparser.

use serde_json::Value;
use sqlparser::ast as sp;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;

use super::error::{ParseError, ParseResult};
use crate::expression::{AggregateFunction, ComparisonOp, Expression};
use crate::plan::{Node, ShowTables, SortField};

/// Parse one SQL statement into an unresolved plan.
pub fn parse(sql: &str) -> ParseResult<Node> {
    Parser::parse(sql)
}

/// SQL to plan converter.
pub struct Parser;

impl Parser {
    /// Parse a SQL string into a plan.
    pub fn parse(sql: &str) -> ParseResult<Node> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        if sql.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        // Statements sqlparser does not model the way we need.
        let upper = sql.to_uppercase();
        let words: Vec<&str> = sql.split_whitespace().collect();
        if upper.starts_with("SHOW TABLES") {
            return match words.as_slice() {
                [_, _] => Ok(Node::ShowTables(ShowTables::new(None))),
                [_, _, from, db] if from.eq_ignore_ascii_case("FROM") || from.eq_ignore_ascii_case("IN") => {
                    Ok(Node::ShowTables(ShowTables::new(Some(unquote(db).to_string()))))
                }
                _ => Err(ParseError::UnsupportedStatement(sql.to_string())),
            };
        }
        if upper.starts_with("SHOW CREATE TABLE") {
            return match words.as_slice() {
                [_, _, _, table] => Ok(Node::show_create_table(Self::table_ref(table)?)),
                _ => Err(ParseError::MissingClause("table name".into())),
            };
        }
        if upper.starts_with("DESCRIBE ") || upper.starts_with("DESC ") {
            let rest = sql
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim())
                .unwrap_or_default();
            if rest.to_uppercase().starts_with("SELECT") {
                return Ok(Node::describe(Self::parse(rest)?));
            }
            return match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [table] => Ok(Node::describe(Self::table_ref(table)?)),
                _ => Err(ParseError::MissingClause("table name".into())),
            };
        }
        if upper.starts_with("SET ") {
            return Ok(Node::Noop);
        }

        let dialect = GenericDialect {};
        let statements = SqlParser::parse_sql(&dialect, sql)?;

        if statements.is_empty() {
            return Err(ParseError::EmptyQuery);
        }
        if statements.len() > 1 {
            return Err(ParseError::MultipleStatements);
        }

        match &statements[0] {
            sp::Statement::Query(query) => Self::convert_query(query),
            other => Err(ParseError::UnsupportedStatement(other.to_string())),
        }
    }

    /// `table` or `db.table`, optionally backquoted.
    fn table_ref(name: &str) -> ParseResult<Node> {
        let parts: Vec<&str> = name.split('.').map(unquote).collect();
        match parts.as_slice() {
            [table] if !table.is_empty() => Ok(Node::unresolved_table(*table)),
            [db, table] if !db.is_empty() && !table.is_empty() => Ok(Node::UnresolvedTable {
                database: Some(db.to_string()),
                name: table.to_string(),
            }),
            _ => Err(ParseError::InvalidIdentifier(name.to_string())),
        }
    }

    fn convert_query(query: &sp::Query) -> ParseResult<Node> {
        let select = match query.body.as_ref() {
            sp::SetExpr::Select(s) => s,
            other => {
                return Err(ParseError::UnsupportedStatement(format!(
                    "unsupported query type: {}",
                    other
                )))
            }
        };
        if select.having.is_some() {
            return Err(ParseError::UnsupportedStatement("HAVING".into()));
        }

        // FROM: comma-separated tables are cross joined left to right.
        let mut node: Option<Node> = None;
        for from in &select.from {
            if !from.joins.is_empty() {
                return Err(ParseError::UnsupportedStatement("JOIN".into()));
            }
            let table = Self::convert_table_factor(&from.relation)?;
            node = Some(match node {
                Some(left) => Node::cross_join(left, table),
                None => table,
            });
        }
        let mut node = node.ok_or_else(|| ParseError::MissingClause("FROM".into()))?;

        if let Some(selection) = &select.selection {
            node = Node::filter(Self::convert_expr(selection)?, node);
        }

        let projection = Self::convert_projection(&select.projection)?;
        let grouping = match &select.group_by {
            sp::GroupByExpr::Expressions(exprs, _) => exprs
                .iter()
                .map(Self::convert_expr)
                .collect::<ParseResult<Vec<_>>>()?,
            sp::GroupByExpr::All(_) => {
                return Err(ParseError::UnsupportedStatement("GROUP BY ALL".into()))
            }
        };

        node = if select.distinct.is_some() {
            if !grouping.is_empty() {
                return Err(ParseError::UnsupportedStatement("DISTINCT with GROUP BY".into()));
            }
            Node::group_by(projection.clone(), projection, node)
        } else if !grouping.is_empty() || projection.iter().any(has_aggregate) {
            Node::group_by(projection, grouping, node)
        } else {
            Node::project(projection, node)
        };

        if let Some(order_by) = &query.order_by {
            let fields = match &order_by.kind {
                sp::OrderByKind::Expressions(exprs) => exprs
                    .iter()
                    .map(Self::convert_order_by_expr)
                    .collect::<ParseResult<Vec<_>>>()?,
                sp::OrderByKind::All(_) => {
                    return Err(ParseError::UnsupportedStatement("ORDER BY ALL".into()))
                }
            };
            if !fields.is_empty() {
                node = Node::sort(fields, node);
            }
        }

        if let Some(offset) = &query.offset {
            node = Node::offset(Self::expr_to_usize(&offset.value)?, node);
        }

        if let Some(limit) = &query.limit {
            node = Node::limit(Self::expr_to_usize(limit)?, node);
        }

        Ok(node)
    }

    fn convert_table_factor(factor: &sp::TableFactor) -> ParseResult<Node> {
        match factor {
            sp::TableFactor::Table { name, .. } => {
                let parts = name
                    .0
                    .iter()
                    .map(|p| p.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| p.to_string()))
                    .collect::<Vec<_>>();
                match parts.as_slice() {
                    [table] => Ok(Node::unresolved_table(table.clone())),
                    [db, table] => Ok(Node::UnresolvedTable {
                        database: Some(db.clone()),
                        name: table.clone(),
                    }),
                    _ => Err(ParseError::InvalidIdentifier(name.to_string())),
                }
            }
            other => Err(ParseError::UnsupportedStatement(format!(
                "unsupported FROM clause: {}",
                other
            ))),
        }
    }

    fn convert_projection(items: &[sp::SelectItem]) -> ParseResult<Vec<Expression>> {
        items
            .iter()
            .map(|item| match item {
                sp::SelectItem::Wildcard(_) => Ok(Expression::Star),
                sp::SelectItem::UnnamedExpr(expr) => Self::convert_expr(expr),
                sp::SelectItem::ExprWithAlias { expr, alias } => {
                    Ok(Expression::alias(Self::convert_expr(expr)?, alias.value.clone()))
                }
                sp::SelectItem::QualifiedWildcard(name, _) => Err(
                    ParseError::UnsupportedExpression(format!("qualified wildcard: {:?}", name)),
                ),
            })
            .collect()
    }

    fn convert_order_by_expr(expr: &sp::OrderByExpr) -> ParseResult<SortField> {
        let expression = Self::convert_expr(&expr.expr)?;
        Ok(match expr.options.asc {
            Some(false) => SortField::desc(expression),
            _ => SortField::asc(expression),
        })
    }

    fn convert_expr(expr: &sp::Expr) -> ParseResult<Expression> {
        match expr {
            sp::Expr::Identifier(id) => Ok(Expression::column(id.value.clone())),

            sp::Expr::CompoundIdentifier(parts) => match parts.as_slice() {
                [table, column] => Ok(Expression::qualified_column(
                    table.value.clone(),
                    column.value.clone(),
                )),
                _ => Err(ParseError::InvalidIdentifier(
                    parts
                        .iter()
                        .map(|p| p.value.as_str())
                        .collect::<Vec<_>>()
                        .join("."),
                )),
            },

            sp::Expr::Value(v) => Ok(Expression::literal(Self::convert_value(v)?)),

            sp::Expr::BinaryOp { left, op, right } => {
                let l = Self::convert_expr(left)?;
                let r = Self::convert_expr(right)?;
                let comparison = match op {
                    sp::BinaryOperator::And => return Ok(Expression::and(l, r)),
                    sp::BinaryOperator::Or => return Ok(Expression::or(l, r)),
                    sp::BinaryOperator::Eq => ComparisonOp::Equals,
                    sp::BinaryOperator::NotEq => ComparisonOp::NotEquals,
                    sp::BinaryOperator::Lt => ComparisonOp::LessThan,
                    sp::BinaryOperator::LtEq => ComparisonOp::LessThanOrEqual,
                    sp::BinaryOperator::Gt => ComparisonOp::GreaterThan,
                    sp::BinaryOperator::GtEq => ComparisonOp::GreaterThanOrEqual,
                    other => {
                        return Err(ParseError::UnsupportedExpression(format!(
                            "unsupported operator: {}",
                            other
                        )))
                    }
                };
                Ok(Expression::comparison(comparison, l, r))
            }

            sp::Expr::UnaryOp { op, expr } => match op {
                sp::UnaryOperator::Not => Ok(Expression::not(Self::convert_expr(expr)?)),
                sp::UnaryOperator::Plus => Self::convert_expr(expr),
                sp::UnaryOperator::Minus => match Self::convert_expr(expr)? {
                    Expression::Literal {
                        value: Value::Number(n),
                        ..
                    } => Ok(Expression::literal(negate(&n)?)),
                    other => Err(ParseError::UnsupportedExpression(format!(
                        "negation of {}",
                        other
                    ))),
                },
                other => Err(ParseError::UnsupportedExpression(format!(
                    "unsupported unary operator: {}",
                    other
                ))),
            },

            sp::Expr::IsNull(e) => Ok(Expression::is_null(Self::convert_expr(e)?)),

            sp::Expr::IsNotNull(e) => Ok(Expression::not(Expression::is_null(
                Self::convert_expr(e)?,
            ))),

            sp::Expr::Like {
                expr,
                pattern,
                negated,
                ..
            } => {
                let like = Expression::like(Self::convert_expr(expr)?, Self::convert_expr(pattern)?);
                Ok(if *negated { Expression::not(like) } else { like })
            }

            sp::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let e = Self::convert_expr(expr)?;
                let between = Expression::and(
                    Expression::comparison(
                        ComparisonOp::GreaterThanOrEqual,
                        e.clone(),
                        Self::convert_expr(low)?,
                    ),
                    Expression::comparison(
                        ComparisonOp::LessThanOrEqual,
                        e,
                        Self::convert_expr(high)?,
                    ),
                );
                Ok(if *negated { Expression::not(between) } else { between })
            }

            sp::Expr::Function(f) => {
                let name = f
                    .name
                    .0
                    .last()
                    .map(|p| p.as_ident().map(|id| id.value.clone()).unwrap_or_else(|| p.to_string()))
                    .ok_or_else(|| ParseError::InvalidIdentifier(f.name.to_string()))?
                    .to_lowercase();
                let args = match &f.args {
                    sp::FunctionArguments::None => vec![],
                    sp::FunctionArguments::List(list) => list
                        .args
                        .iter()
                        .map(|arg| match arg {
                            sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => {
                                Self::convert_expr(e)
                            }
                            sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => {
                                Ok(Expression::Star)
                            }
                            other => Err(ParseError::UnsupportedExpression(format!(
                                "function argument: {}",
                                other
                            ))),
                        })
                        .collect::<ParseResult<Vec<_>>>()?,
                    sp::FunctionArguments::Subquery(_) => {
                        return Err(ParseError::UnsupportedExpression("subquery".into()))
                    }
                };
                Ok(Expression::function(name, args))
            }

            sp::Expr::Nested(inner) => Self::convert_expr(inner),

            other => Err(ParseError::UnsupportedExpression(other.to_string())),
        }
    }

    fn convert_value(v: &sp::ValueWithSpan) -> ParseResult<Value> {
        match &v.value {
            sp::Value::Null => Ok(Value::Null),
            sp::Value::Boolean(b) => Ok(Value::Bool(*b)),
            sp::Value::Number(s, _) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64)
                {
                    Ok(Value::Number(n))
                } else {
                    Err(ParseError::UnsupportedExpression(format!("invalid number: {}", s)))
                }
            }
            sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
                Ok(Value::from(s.clone()))
            }
            other => Err(ParseError::UnsupportedExpression(format!(
                "unsupported value: {}",
                other
            ))),
        }
    }

    fn expr_to_usize(expr: &sp::Expr) -> ParseResult<usize> {
        match expr {
            sp::Expr::Value(v) => match &v.value {
                sp::Value::Number(s, _) => s.parse().map_err(|_| {
                    ParseError::UnsupportedExpression(format!("expected a row count, got {}", s))
                }),
                other => Err(ParseError::UnsupportedExpression(format!(
                    "expected a row count, got {}",
                    other
                ))),
            },
            other => Err(ParseError::UnsupportedExpression(format!(
                "expected a row count, got {}",
                other
            ))),
        }
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches('`')
}

fn negate(n: &serde_json::Number) -> ParseResult<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(-i))
    } else if let Some(f) = n.as_f64() {
        Ok(Value::from(-f))
    } else {
        Err(ParseError::UnsupportedExpression(format!("negation of {}", n)))
    }
}

/// Whether the expression calls an aggregate function, making the
/// projection a grouping.
fn has_aggregate(expr: &Expression) -> bool {
    expr.any(&|e: &Expression| match e {
        Expression::UnresolvedFunction { name, .. } => {
            AggregateFunction::ALL
                .iter()
                .any(|f| f.name().eq_ignore_ascii_case(name))
        }
        Expression::Aggregate { .. } => true,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str) -> Expression {
        Expression::column(name)
    }

    #[test]
    fn test_parse_select_all() {
        let node = parse("SELECT * FROM users").unwrap();
        assert_eq!(
            node,
            Node::project(vec![Expression::Star], Node::unresolved_table("users"))
        );
    }

    #[test]
    fn test_parse_select_where() {
        let node = parse("SELECT id, name AS n FROM users WHERE age > 21").unwrap();
        assert_eq!(
            node,
            Node::project(
                vec![column("id"), Expression::alias(column("name"), "n")],
                Node::filter(
                    Expression::comparison(
                        ComparisonOp::GreaterThan,
                        column("age"),
                        Expression::literal(json!(21))
                    ),
                    Node::unresolved_table("users")
                )
            )
        );
    }

    #[test]
    fn test_parse_group_by() {
        let node = parse(
            "SELECT name, COUNT(*) FROM mytable WHERE name = 'John Doe' GROUP BY name",
        )
        .unwrap();
        assert_eq!(
            node,
            Node::group_by(
                vec![column("name"), Expression::function("count", vec![Expression::Star])],
                vec![column("name")],
                Node::filter(
                    Expression::equals(column("name"), Expression::literal(json!("John Doe"))),
                    Node::unresolved_table("mytable")
                )
            )
        );
    }

    #[test]
    fn test_parse_implicit_grouping() {
        let node = parse("SELECT max(age) FROM users").unwrap();
        assert!(matches!(node, Node::GroupBy { ref grouping, .. } if grouping.is_empty()));
    }

    #[test]
    fn test_parse_order_limit_offset() {
        let node = parse("SELECT * FROM users ORDER BY name DESC, id LIMIT 10 OFFSET 5").unwrap();
        assert_eq!(
            node,
            Node::limit(
                10,
                Node::offset(
                    5,
                    Node::sort(
                        vec![SortField::desc(column("name")), SortField::asc(column("id"))],
                        Node::project(vec![Expression::Star], Node::unresolved_table("users"))
                    )
                )
            )
        );
    }

    #[test]
    fn test_parse_cross_join_and_qualified() {
        let node = parse("SELECT a.x, y FROM mydb.a, b").unwrap();
        assert_eq!(
            node,
            Node::project(
                vec![Expression::qualified_column("a", "x"), column("y")],
                Node::cross_join(
                    Node::UnresolvedTable {
                        database: Some("mydb".into()),
                        name: "a".into()
                    },
                    Node::unresolved_table("b")
                )
            )
        );
    }

    #[test]
    fn test_parse_predicates() {
        let node = parse(
            "SELECT * FROM t WHERE a IS NOT NULL AND (b LIKE 'x%' OR NOT c) AND d <> -1",
        )
        .unwrap();
        let Node::Project { child, .. } = node else {
            panic!("expected project");
        };
        let Node::Filter { predicate, .. } = *child else {
            panic!("expected filter");
        };
        assert_eq!(
            predicate,
            Expression::and(
                Expression::and(
                    Expression::not(Expression::is_null(column("a"))),
                    Expression::or(
                        Expression::like(column("b"), Expression::literal(json!("x%"))),
                        Expression::not(column("c"))
                    )
                ),
                Expression::comparison(
                    ComparisonOp::NotEquals,
                    column("d"),
                    Expression::literal(json!(-1))
                )
            )
        );
    }

    #[test]
    fn test_parse_show_and_describe() {
        assert_eq!(parse("SHOW TABLES").unwrap(), Node::ShowTables(ShowTables::new(None)));
        assert_eq!(
            parse("show tables from mydb").unwrap(),
            Node::ShowTables(ShowTables::new(Some("mydb".into())))
        );
        assert_eq!(
            parse("DESCRIBE `mytable`").unwrap(),
            Node::describe(Node::unresolved_table("mytable"))
        );
        assert_eq!(
            parse("SHOW CREATE TABLE mydb.mytable;").unwrap(),
            Node::show_create_table(Node::UnresolvedTable {
                database: Some("mydb".into()),
                name: "mytable".into()
            })
        );
        assert!(matches!(
            parse("DESCRIBE SELECT * FROM t").unwrap(),
            Node::Describe { .. }
        ));
        assert_eq!(parse("SET autocommit = 1").unwrap(), Node::Noop);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("  "), Err(ParseError::EmptyQuery));
        assert!(matches!(parse("SELEC * FROM t"), Err(ParseError::Syntax(_))));
        assert!(matches!(
            parse("SELECT 1; SELECT 2"),
            Err(ParseError::MultipleStatements)
        ));
        assert!(matches!(
            parse("SELECT * FROM a JOIN b ON a.x = b.x"),
            Err(ParseError::UnsupportedStatement(_))
        ));
        assert!(matches!(
            parse("SELECT 1"),
            Err(ParseError::MissingClause(_))
        ));
        assert!(matches!(
            parse("DELETE FROM t"),
            Err(ParseError::UnsupportedStatement(_))
        ));
    }
}
