//! Built-in validation rules.

use super::ValidationRule;
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::plan::Node;

/// Rejects trees that still hold placeholders.
pub struct ValidateResolved;

impl ValidationRule for ValidateResolved {
    fn name(&self) -> &str {
        "validate_resolved"
    }

    fn validate(&self, node: &Node) -> Result<()> {
        walk(node, &mut |n| {
            if n.children().iter().all(|c| c.resolved()) && !n.resolved() {
                let label = n.to_string();
                return Err(Error::Validation(format!(
                    "plan is not resolved: {}",
                    label.lines().next().unwrap_or_default()
                )));
            }
            Ok(())
        })
    }
}

/// Rejects aggregate expressions in ORDER BY.
pub struct ValidateOrderBy;

impl ValidationRule for ValidateOrderBy {
    fn name(&self) -> &str {
        "validate_order_by"
    }

    fn validate(&self, node: &Node) -> Result<()> {
        walk(node, &mut |n| {
            if let Node::Sort { fields, .. } = n {
                if let Some(field) = fields.iter().find(|f| f.expression.is_aggregate()) {
                    return Err(Error::Validation(format!(
                        "aggregation in ORDER BY is not supported: {}",
                        field.expression
                    )));
                }
            }
            Ok(())
        })
    }
}

/// Rejects aggregates anywhere but at the top of a group-by output
/// expression, and aggregates nested inside another aggregate.
pub struct ValidateAggregates;

impl ValidationRule for ValidateAggregates {
    fn name(&self) -> &str {
        "validate_aggregates"
    }

    fn validate(&self, node: &Node) -> Result<()> {
        walk(node, &mut |n| {
            let allowed_top_level: Vec<&Expression> = match n {
                Node::GroupBy { aggregate, .. } => aggregate.iter().collect(),
                _ => vec![],
            };
            for e in n.expressions() {
                let inner = if allowed_top_level.iter().any(|a| std::ptr::eq(*a, e)) {
                    match unalias(e) {
                        Expression::Aggregate { child, .. } => child.as_ref(),
                        other => other,
                    }
                } else {
                    e
                };
                if inner.any(&|x: &Expression| matches!(x, Expression::Aggregate { .. })) {
                    return Err(Error::Validation(format!(
                        "aggregation is not supported in this position: {}",
                        e
                    )));
                }
            }
            Ok(())
        })
    }
}

fn unalias(e: &Expression) -> &Expression {
    match e {
        Expression::Alias { child, .. } => unalias(child),
        other => other,
    }
}

/// Visit every node, children first.
fn walk<F>(node: &Node, f: &mut F) -> Result<()>
where
    F: FnMut(&Node) -> Result<()>,
{
    for child in node.children() {
        walk(child, f)?;
    }
    f(node)
}
