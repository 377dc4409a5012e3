//! Built-in rewrite rules.

use log::trace;

use super::Rule;
use crate::catalog::{Catalog, Schema};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::plan::Node;
use crate::session::Context;

/// Replaces unresolved table references with the catalog's table.
pub struct ResolveTables;

impl Rule for ResolveTables {
    fn name(&self) -> &str {
        "resolve_tables"
    }

    fn apply(&self, catalog: &Catalog, ctx: &Context, node: &Node) -> Result<Node> {
        node.transform_up(&mut |n| match n {
            Node::UnresolvedTable { database, name } => {
                let database = database.as_deref().unwrap_or(ctx.current_database());
                trace!("resolving table {}.{}", database, name);
                Ok(Node::table(catalog.table(database, &name)?))
            }
            other => Ok(other),
        })
    }
}

/// Binds introspection nodes to their database.
pub struct ResolveCatalogNodes;

impl Rule for ResolveCatalogNodes {
    fn name(&self) -> &str {
        "resolve_catalog_nodes"
    }

    fn apply(&self, catalog: &Catalog, ctx: &Context, node: &Node) -> Result<Node> {
        node.transform_up(&mut |n| match n {
            Node::ShowTables(show) if !show.resolved() => {
                let name = show.database.as_deref().unwrap_or(ctx.current_database());
                let db = catalog
                    .database(name)
                    .ok_or_else(|| Error::DatabaseNotFound(name.to_string()))?;
                Ok(Node::ShowTables(show.bind(db)))
            }
            other => Ok(other),
        })
    }
}

/// Builds function expressions through the catalog's registry.
pub struct ResolveFunctions;

impl Rule for ResolveFunctions {
    fn name(&self) -> &str {
        "resolve_functions"
    }

    fn apply(&self, catalog: &Catalog, _ctx: &Context, node: &Node) -> Result<Node> {
        node.transform_expressions_up(&mut |e| match e {
            Expression::UnresolvedFunction { name, args } => {
                let constructor = catalog
                    .function(&name.to_lowercase())
                    .ok_or_else(|| Error::FunctionNotFound(name.clone()))?;
                constructor(args)
            }
            other => Ok(other),
        })
    }
}

/// Replaces top-level wildcards of projections and of group-by outputs and
/// keys with the child's columns once the child is resolved.
pub struct ExpandStars;

impl Rule for ExpandStars {
    fn name(&self) -> &str {
        "expand_stars"
    }

    fn apply(&self, _catalog: &Catalog, _ctx: &Context, node: &Node) -> Result<Node> {
        node.transform_up(&mut |n| {
            Ok(match n {
                Node::Project { expressions, child }
                    if child.resolved() && has_star(&expressions) =>
                {
                    Node::Project {
                        expressions: expand(expressions, &child.schema()),
                        child,
                    }
                }
                Node::GroupBy {
                    aggregate,
                    grouping,
                    child,
                } if child.resolved() && (has_star(&aggregate) || has_star(&grouping)) => {
                    let schema = child.schema();
                    Node::GroupBy {
                        aggregate: expand(aggregate, &schema),
                        grouping: expand(grouping, &schema),
                        child,
                    }
                }
                other => other,
            })
        })
    }
}

fn has_star(expressions: &[Expression]) -> bool {
    expressions.iter().any(|e| *e == Expression::Star)
}

fn expand(expressions: Vec<Expression>, schema: &Schema) -> Vec<Expression> {
    let mut expanded = Vec::with_capacity(expressions.len() + schema.len());
    for e in expressions {
        if e == Expression::Star {
            expanded.extend(schema.iter().enumerate().map(|(i, c)| {
                Expression::get_field(i, c.data_type, c.name.clone(), c.nullable)
            }));
        } else {
            expanded.push(e);
        }
    }
    expanded
}

/// Replaces column names with positional references into the concatenated
/// schema of the node's children.
pub struct ResolveColumns;

impl Rule for ResolveColumns {
    fn name(&self) -> &str {
        "resolve_columns"
    }

    fn apply(&self, _catalog: &Catalog, _ctx: &Context, node: &Node) -> Result<Node> {
        node.transform_up(&mut |n| {
            let ready = {
                let children = n.children();
                !children.is_empty() && children.iter().all(|c| c.resolved())
            };
            if !ready {
                return Ok(n);
            }

            let schema = n
                .children()
                .iter()
                .fold(Schema::empty(), |acc, c| acc.concat(&c.schema()));
            n.transform_expressions(&mut |e| match e {
                Expression::UnresolvedColumn { table, name } => {
                    resolve_column(&schema, table.as_deref(), &name)
                }
                other => Ok(other),
            })
        })
    }
}

fn resolve_column(schema: &Schema, table: Option<&str>, name: &str) -> Result<Expression> {
    let display = match table {
        Some(table) => format!("{}.{}", table, name),
        None => name.to_string(),
    };

    let mut matches = schema.iter().enumerate().filter(|(_, c)| {
        c.name.eq_ignore_ascii_case(name) && table.map_or(true, |t| c.source == t)
    });

    match (matches.next(), matches.next()) {
        (Some((index, column)), None) => Ok(Expression::get_field(
            index,
            column.data_type,
            column.name.clone(),
            column.nullable,
        )),
        (Some(_), Some(_)) => Err(Error::AmbiguousColumn(display)),
        (None, _) => Err(Error::ColumnNotFound(display)),
    }
}
