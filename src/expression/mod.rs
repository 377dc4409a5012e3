//! Expression trees.
//!
//! An [`Expression`] is an immutable tree of scalar or aggregate
//! computations evaluated against a positional [`Row`](crate::catalog::Row).
//! The parser produces placeholders ([`Expression::UnresolvedColumn`],
//! [`Expression::UnresolvedFunction`], [`Expression::Star`]) which the
//! analyzer replaces with concrete variants before execution.

mod aggregate;
mod eval;
mod registry;
mod time;

use std::fmt;

use serde_json::Value;

use crate::catalog::DataType;
use crate::error::Result;

pub use aggregate::{Accumulator, AggregateFunction};
pub use registry::register_defaults;
pub use time::DatePart;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Equals => "=",
            ComparisonOp::NotEquals => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }
}

/// A scalar or aggregate expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant value with an explicit type.
    Literal { value: Value, data_type: DataType },
    /// Positional reference into the input row.
    GetField {
        index: usize,
        data_type: DataType,
        name: String,
        nullable: bool,
    },
    /// Column referenced by name, optionally qualified by table.
    UnresolvedColumn { table: Option<String>, name: String },
    /// Function call not yet bound to the registry.
    UnresolvedFunction { name: String, args: Vec<Expression> },
    /// Renames its child.
    Alias { child: Box<Expression>, name: String },
    /// Wildcard, expanded by the analyzer.
    Star,
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// SQL `LIKE` with `%` and `_` wildcards, case-insensitive.
    Like {
        expr: Box<Expression>,
        pattern: Box<Expression>,
    },
    /// Extract an integer part from a date or timestamp.
    DatePart { part: DatePart, child: Box<Expression> },
    /// Accumulates over every row of a group.
    Aggregate {
        function: AggregateFunction,
        child: Box<Expression>,
    },
}

impl Expression {
    /// Literal with a type inferred from the value.
    pub fn literal(value: Value) -> Self {
        Expression::Literal {
            data_type: DataType::infer(&value),
            value,
        }
    }

    pub fn get_field(
        index: usize,
        data_type: DataType,
        name: impl Into<String>,
        nullable: bool,
    ) -> Self {
        Expression::GetField {
            index,
            data_type,
            name: name.into(),
            nullable,
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        Expression::UnresolvedColumn {
            table: None,
            name: name.into(),
        }
    }

    pub fn qualified_column(table: impl Into<String>, name: impl Into<String>) -> Self {
        Expression::UnresolvedColumn {
            table: Some(table.into()),
            name: name.into(),
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::UnresolvedFunction {
            name: name.into(),
            args,
        }
    }

    pub fn alias(child: Expression, name: impl Into<String>) -> Self {
        Expression::Alias {
            child: Box::new(child),
            name: name.into(),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Expression) -> Self {
        Expression::Not(Box::new(child))
    }

    pub fn is_null(child: Expression) -> Self {
        Expression::IsNull(Box::new(child))
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::comparison(ComparisonOp::Equals, left, right)
    }

    pub fn like(expr: Expression, pattern: Expression) -> Self {
        Expression::Like {
            expr: Box::new(expr),
            pattern: Box::new(pattern),
        }
    }

    pub fn date_part(part: DatePart, child: Expression) -> Self {
        Expression::DatePart {
            part,
            child: Box::new(child),
        }
    }

    pub fn aggregate(function: AggregateFunction, child: Expression) -> Self {
        Expression::Aggregate {
            function,
            child: Box::new(child),
        }
    }

    /// `count(*)`.
    pub fn count_star() -> Self {
        Self::aggregate(AggregateFunction::Count, Expression::Star)
    }

    /// Static result type. Placeholders report [`DataType::Null`].
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal { data_type, .. } | Expression::GetField { data_type, .. } => {
                *data_type
            }
            Expression::UnresolvedColumn { .. }
            | Expression::UnresolvedFunction { .. }
            | Expression::Star => DataType::Null,
            Expression::Alias { child, .. } => child.data_type(),
            Expression::And(..)
            | Expression::Or(..)
            | Expression::Not(_)
            | Expression::IsNull(_)
            | Expression::Comparison { .. }
            | Expression::Like { .. } => DataType::Boolean,
            Expression::DatePart { .. } => DataType::Int32,
            Expression::Aggregate { function, child } => function.data_type(child.data_type()),
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            Expression::Literal { value, .. } => value.is_null(),
            Expression::GetField { nullable, .. } => *nullable,
            Expression::UnresolvedColumn { .. }
            | Expression::UnresolvedFunction { .. }
            | Expression::Star => true,
            Expression::Alias { child, .. } => child.is_nullable(),
            Expression::IsNull(_) => false,
            Expression::Aggregate { function, .. } => *function != AggregateFunction::Count,
            _ => self.children().iter().any(|c| c.is_nullable()),
        }
    }

    /// Whether the subtree holds no placeholder.
    pub fn resolved(&self) -> bool {
        match self {
            Expression::UnresolvedColumn { .. }
            | Expression::UnresolvedFunction { .. }
            | Expression::Star => false,
            Expression::Aggregate {
                function: AggregateFunction::Count,
                child,
            } if **child == Expression::Star => true,
            _ => self.children().iter().all(|c| c.resolved()),
        }
    }

    /// Output column name used when no alias is given.
    pub fn name(&self) -> String {
        match self {
            Expression::Literal { value, .. } => match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            Expression::GetField { name, .. }
            | Expression::UnresolvedColumn { name, .. }
            | Expression::Alias { name, .. } => name.clone(),
            Expression::UnresolvedFunction { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.name()).collect();
                format!("{}({})", name, args.join(", "))
            }
            Expression::Star => "*".to_string(),
            Expression::And(l, r) => format!("{} AND {}", l.name(), r.name()),
            Expression::Or(l, r) => format!("{} OR {}", l.name(), r.name()),
            Expression::Not(c) => format!("NOT {}", c.name()),
            Expression::IsNull(c) => format!("{} IS NULL", c.name()),
            Expression::Comparison { op, left, right } => {
                format!("{} {} {}", left.name(), op.symbol(), right.name())
            }
            Expression::Like { expr, pattern } => {
                format!("{} LIKE {}", expr.name(), pattern.name())
            }
            Expression::DatePart { part, child } => format!("{}({})", part.name(), child.name()),
            Expression::Aggregate { function, child } => {
                format!("{}({})", function.name(), child.name())
            }
        }
    }

    /// Whether this expression accumulates across the rows of a group.
    /// Aliases carry their child's capability.
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate { .. } => true,
            Expression::Alias { child, .. } => child.is_aggregate(),
            _ => false,
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal { .. }
            | Expression::GetField { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::Star => vec![],
            Expression::UnresolvedFunction { args, .. } => args.iter().collect(),
            Expression::Alias { child, .. }
            | Expression::Not(child)
            | Expression::IsNull(child)
            | Expression::DatePart { child, .. }
            | Expression::Aggregate { child, .. } => vec![child.as_ref()],
            Expression::And(l, r) | Expression::Or(l, r) => vec![l.as_ref(), r.as_ref()],
            Expression::Comparison { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Like { expr, pattern } => vec![expr.as_ref(), pattern.as_ref()],
        }
    }

    /// Rebuild the tree bottom-up, applying `f` to every node after its
    /// children. The first error aborts the rebuild.
    pub fn transform_up<F>(&self, f: &mut F) -> Result<Expression>
    where
        F: FnMut(Expression) -> Result<Expression>,
    {
        let rebuilt = match self {
            Expression::Literal { .. }
            | Expression::GetField { .. }
            | Expression::UnresolvedColumn { .. }
            | Expression::Star => self.clone(),
            Expression::UnresolvedFunction { name, args } => Expression::UnresolvedFunction {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.transform_up(f))
                    .collect::<Result<_>>()?,
            },
            Expression::Alias { child, name } => Expression::Alias {
                child: child.transform_boxed(f)?,
                name: name.clone(),
            },
            Expression::And(l, r) => Expression::And(l.transform_boxed(f)?, r.transform_boxed(f)?),
            Expression::Or(l, r) => Expression::Or(l.transform_boxed(f)?, r.transform_boxed(f)?),
            Expression::Not(c) => Expression::Not(c.transform_boxed(f)?),
            Expression::IsNull(c) => Expression::IsNull(c.transform_boxed(f)?),
            Expression::Comparison { op, left, right } => Expression::Comparison {
                op: *op,
                left: left.transform_boxed(f)?,
                right: right.transform_boxed(f)?,
            },
            Expression::Like { expr, pattern } => Expression::Like {
                expr: expr.transform_boxed(f)?,
                pattern: pattern.transform_boxed(f)?,
            },
            Expression::DatePart { part, child } => Expression::DatePart {
                part: *part,
                child: child.transform_boxed(f)?,
            },
            Expression::Aggregate { function, child } => Expression::Aggregate {
                function: *function,
                child: child.transform_boxed(f)?,
            },
        };
        f(rebuilt)
    }

    fn transform_boxed<F>(&self, f: &mut F) -> Result<Box<Expression>>
    where
        F: FnMut(Expression) -> Result<Expression>,
    {
        Ok(Box::new(self.transform_up(f)?))
    }

    /// Whether any node in the subtree satisfies `predicate`.
    pub fn any(&self, predicate: &dyn Fn(&Expression) -> bool) -> bool {
        predicate(self) || self.children().iter().any(|c| c.any(predicate))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
