//! Plan node trees.
//!
//! A [`Node`] is an immutable relational operator tree. Every node exposes
//! its output [`Schema`] and builds a [`RowIter`] that pulls from its
//! children's iterators. Rewrites always produce a new tree.

mod group_by;
mod iter;
mod show;
mod sort;

use std::fmt;
use std::sync::Arc;

use crate::catalog::{Column, Schema, Table};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::session::Context;

pub use group_by::GroupByIter;
pub use iter::{
    collect_rows, CancellableIter, CrossJoinIter, FilterIter, LimitIter, OffsetIter, ProjectIter,
    RowIter, RowsIter,
};
pub use show::{DatabaseRef, ShowTables};
pub use sort::{SortField, SortIter, SortOrder};

/// A table bound into a plan.
#[derive(Clone)]
pub struct ResolvedTable(pub Arc<dyn Table>);

impl ResolvedTable {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn schema(&self) -> &Schema {
        self.0.schema()
    }
}

impl PartialEq for ResolvedTable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ResolvedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResolvedTable").field(&self.0.name()).finish()
    }
}

/// Relational plan node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Table referenced by name, in the named or current database.
    UnresolvedTable {
        database: Option<String>,
        name: String,
    },
    Table(ResolvedTable),
    Project {
        expressions: Vec<Expression>,
        child: Box<Node>,
    },
    Filter {
        predicate: Expression,
        child: Box<Node>,
    },
    GroupBy {
        aggregate: Vec<Expression>,
        grouping: Vec<Expression>,
        child: Box<Node>,
    },
    Sort {
        fields: Vec<SortField>,
        child: Box<Node>,
    },
    Limit {
        limit: usize,
        child: Box<Node>,
    },
    Offset {
        offset: usize,
        child: Box<Node>,
    },
    CrossJoin {
        left: Box<Node>,
        right: Box<Node>,
    },
    /// One `(name, type)` row per column of the child schema.
    Describe {
        child: Box<Node>,
    },
    ShowTables(ShowTables),
    /// `CREATE TABLE` statement of the child table.
    ShowCreateTable {
        child: Box<Node>,
    },
    /// Statement without a tabular result.
    Noop,
}

impl Node {
    pub fn unresolved_table(name: impl Into<String>) -> Self {
        Node::UnresolvedTable {
            database: None,
            name: name.into(),
        }
    }

    pub fn table(table: Arc<dyn Table>) -> Self {
        Node::Table(ResolvedTable(table))
    }

    pub fn project(expressions: Vec<Expression>, child: Node) -> Self {
        Node::Project {
            expressions,
            child: Box::new(child),
        }
    }

    pub fn filter(predicate: Expression, child: Node) -> Self {
        Node::Filter {
            predicate,
            child: Box::new(child),
        }
    }

    pub fn group_by(aggregate: Vec<Expression>, grouping: Vec<Expression>, child: Node) -> Self {
        Node::GroupBy {
            aggregate,
            grouping,
            child: Box::new(child),
        }
    }

    pub fn sort(fields: Vec<SortField>, child: Node) -> Self {
        Node::Sort {
            fields,
            child: Box::new(child),
        }
    }

    pub fn limit(limit: usize, child: Node) -> Self {
        Node::Limit {
            limit,
            child: Box::new(child),
        }
    }

    pub fn offset(offset: usize, child: Node) -> Self {
        Node::Offset {
            offset,
            child: Box::new(child),
        }
    }

    pub fn cross_join(left: Node, right: Node) -> Self {
        Node::CrossJoin {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn describe(child: Node) -> Self {
        Node::Describe {
            child: Box::new(child),
        }
    }

    pub fn show_create_table(child: Node) -> Self {
        Node::ShowCreateTable {
            child: Box::new(child),
        }
    }

    /// Output schema.
    pub fn schema(&self) -> Schema {
        match self {
            Node::UnresolvedTable { .. } | Node::Noop => Schema::empty(),
            Node::Table(table) => table.schema().clone(),
            Node::Project { expressions, child } => expression_schema(expressions, child),
            Node::GroupBy {
                aggregate, child, ..
            } => expression_schema(aggregate, child),
            Node::Filter { child, .. }
            | Node::Sort { child, .. }
            | Node::Limit { child, .. }
            | Node::Offset { child, .. } => child.schema(),
            Node::CrossJoin { left, right } => left.schema().concat(&right.schema()),
            Node::Describe { .. } => show::describe_schema(),
            Node::ShowTables(_) => ShowTables::schema(),
            Node::ShowCreateTable { .. } => show::show_create_table_schema(),
        }
    }

    /// Whether no placeholder remains in this node, its expressions or its
    /// children.
    pub fn resolved(&self) -> bool {
        match self {
            Node::UnresolvedTable { .. } => false,
            Node::ShowTables(show) => show.resolved(),
            _ => {
                self.expressions().iter().all(|e| e.resolved())
                    && self.children().iter().all(|c| c.resolved())
            }
        }
    }

    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::UnresolvedTable { .. } | Node::Table(_) | Node::ShowTables(_) | Node::Noop => {
                vec![]
            }
            Node::Project { child, .. }
            | Node::Filter { child, .. }
            | Node::GroupBy { child, .. }
            | Node::Sort { child, .. }
            | Node::Limit { child, .. }
            | Node::Offset { child, .. }
            | Node::Describe { child }
            | Node::ShowCreateTable { child } => vec![child.as_ref()],
            Node::CrossJoin { left, right } => vec![left.as_ref(), right.as_ref()],
        }
    }

    /// Expressions held directly by this node, in order.
    pub fn expressions(&self) -> Vec<&Expression> {
        match self {
            Node::Project { expressions, .. } => expressions.iter().collect(),
            Node::Filter { predicate, .. } => vec![predicate],
            Node::GroupBy {
                aggregate,
                grouping,
                ..
            } => aggregate.iter().chain(grouping.iter()).collect(),
            Node::Sort { fields, .. } => fields.iter().map(|f| &f.expression).collect(),
            _ => vec![],
        }
    }

    /// Rebuild this node around children produced by `f`.
    fn map_children<F>(&self, f: &mut F) -> Result<Node>
    where
        F: FnMut(&Node) -> Result<Node>,
    {
        let mut child = |c: &Node| -> Result<Box<Node>> { Ok(Box::new(f(c)?)) };
        Ok(match self {
            Node::UnresolvedTable { .. } | Node::Table(_) | Node::ShowTables(_) | Node::Noop => {
                self.clone()
            }
            Node::Project { expressions, child: c } => Node::Project {
                expressions: expressions.clone(),
                child: child(c)?,
            },
            Node::Filter { predicate, child: c } => Node::Filter {
                predicate: predicate.clone(),
                child: child(c)?,
            },
            Node::GroupBy {
                aggregate,
                grouping,
                child: c,
            } => Node::GroupBy {
                aggregate: aggregate.clone(),
                grouping: grouping.clone(),
                child: child(c)?,
            },
            Node::Sort { fields, child: c } => Node::Sort {
                fields: fields.clone(),
                child: child(c)?,
            },
            Node::Limit { limit, child: c } => Node::Limit {
                limit: *limit,
                child: child(c)?,
            },
            Node::Offset { offset, child: c } => Node::Offset {
                offset: *offset,
                child: child(c)?,
            },
            Node::CrossJoin { left, right } => Node::CrossJoin {
                left: child(left)?,
                right: child(right)?,
            },
            Node::Describe { child: c } => Node::Describe { child: child(c)? },
            Node::ShowCreateTable { child: c } => Node::ShowCreateTable { child: child(c)? },
        })
    }

    /// Rebuild the tree bottom-up, applying `f` to every node after its
    /// children. The first error aborts the rebuild.
    pub fn transform_up<F>(&self, f: &mut F) -> Result<Node>
    where
        F: FnMut(Node) -> Result<Node>,
    {
        let rebuilt = self.map_children(&mut |c: &Node| c.transform_up(f))?;
        f(rebuilt)
    }

    /// Apply `f` bottom-up to every expression held directly by this node.
    pub fn transform_expressions<F>(&self, f: &mut F) -> Result<Node>
    where
        F: FnMut(Expression) -> Result<Expression>,
    {
        Ok(match self {
            Node::Project { expressions, child } => Node::Project {
                expressions: transform_all(expressions, f)?,
                child: child.clone(),
            },
            Node::Filter { predicate, child } => Node::Filter {
                predicate: predicate.transform_up(f)?,
                child: child.clone(),
            },
            Node::GroupBy {
                aggregate,
                grouping,
                child,
            } => Node::GroupBy {
                aggregate: transform_all(aggregate, f)?,
                grouping: transform_all(grouping, f)?,
                child: child.clone(),
            },
            Node::Sort { fields, child } => Node::Sort {
                fields: fields
                    .iter()
                    .map(|field| -> Result<SortField> {
                        Ok(SortField {
                            expression: field.expression.transform_up(f)?,
                            order: field.order,
                        })
                    })
                    .collect::<Result<_>>()?,
                child: child.clone(),
            },
            _ => self.clone(),
        })
    }

    /// Apply `f` to every expression of every node in the tree.
    pub fn transform_expressions_up<F>(&self, f: &mut F) -> Result<Node>
    where
        F: FnMut(Expression) -> Result<Expression>,
    {
        self.transform_up(&mut |node: Node| node.transform_expressions(&mut *f))
    }

    /// Build the iterator producing this node's rows.
    pub fn row_iter(&self, ctx: &Context) -> Result<Box<dyn RowIter>> {
        Ok(match self {
            Node::UnresolvedTable { name, .. } => return Err(Error::Unresolved(name.clone())),
            Node::Table(table) => Box::new(CancellableIter::new(ctx.clone(), table.0.row_iter()?)),
            Node::Project { expressions, child } => Box::new(ProjectIter::new(
                ctx.clone(),
                child.row_iter(ctx)?,
                expressions.clone(),
            )),
            Node::Filter { predicate, child } => Box::new(FilterIter::new(
                ctx.clone(),
                child.row_iter(ctx)?,
                predicate.clone(),
            )),
            Node::GroupBy {
                aggregate,
                grouping,
                child,
            } => Box::new(GroupByIter::new(
                ctx.clone(),
                child.row_iter(ctx)?,
                aggregate.clone(),
                grouping.clone(),
            )),
            Node::Sort { fields, child } => Box::new(SortIter::new(
                ctx.clone(),
                child.row_iter(ctx)?,
                fields.clone(),
            )),
            Node::Limit { limit, child } => Box::new(LimitIter::new(child.row_iter(ctx)?, *limit)),
            Node::Offset { offset, child } => {
                Box::new(OffsetIter::new(child.row_iter(ctx)?, *offset))
            }
            Node::CrossJoin { left, right } => {
                let mut left = left.row_iter(ctx)?;
                let right = match right.row_iter(ctx) {
                    Ok(right) => right,
                    Err(err) => {
                        left.close()?;
                        return Err(err);
                    }
                };
                Box::new(CrossJoinIter::new(left, right))
            }
            Node::Describe { child } => Box::new(RowsIter::new(show::describe_rows(&child.schema()))),
            Node::ShowTables(show) => Box::new(RowsIter::new(show.rows())),
            Node::ShowCreateTable { child } => match child.as_ref() {
                Node::Table(table) => {
                    Box::new(RowsIter::new(show::show_create_table_rows(table.0.as_ref())))
                }
                other => {
                    return Err(Error::Internal(format!(
                        "SHOW CREATE TABLE over non-table node {}",
                        other.label()
                    )))
                }
            },
            Node::Noop => Box::new(RowsIter::empty()),
        })
    }

    /// One-line description used in plan output.
    fn label(&self) -> String {
        fn list(exprs: &[Expression]) -> String {
            exprs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
        }

        match self {
            Node::UnresolvedTable {
                database: Some(db),
                name,
            } => format!("UnresolvedTable({}.{})", db, name),
            Node::UnresolvedTable { name, .. } => format!("UnresolvedTable({})", name),
            Node::Table(table) => format!("Table({})", table.name()),
            Node::Project { expressions, .. } => format!("Project({})", list(expressions)),
            Node::Filter { predicate, .. } => format!("Filter({})", predicate),
            Node::GroupBy {
                aggregate,
                grouping,
                ..
            } => format!(
                "GroupBy(aggregate: [{}], grouping: [{}])",
                list(aggregate),
                list(grouping)
            ),
            Node::Sort { fields, .. } => {
                let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
                format!("Sort({})", fields.join(", "))
            }
            Node::Limit { limit, .. } => format!("Limit({})", limit),
            Node::Offset { offset, .. } => format!("Offset({})", offset),
            Node::CrossJoin { .. } => "CrossJoin".to_string(),
            Node::Describe { .. } => "Describe".to_string(),
            Node::ShowTables(show) => match &show.database {
                Some(db) => format!("ShowTables({})", db),
                None => "ShowTables".to_string(),
            },
            Node::ShowCreateTable { .. } => "ShowCreateTable".to_string(),
            Node::Noop => "Noop".to_string(),
        }
    }

    fn format_indent(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(indent), self.label())?;
        for child in self.children() {
            child.format_indent(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_indent(f, 0)
    }
}

fn transform_all<F>(exprs: &[Expression], f: &mut F) -> Result<Vec<Expression>>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    exprs.iter().map(|e| e.transform_up(f)).collect()
}

/// Schema of an expression list evaluated over `child`. Positional field
/// references keep the source table of the column they read.
fn expression_schema(expressions: &[Expression], child: &Node) -> Schema {
    let child_schema = child.schema();
    expressions
        .iter()
        .map(|e| {
            let column = Column::new(e.name(), e.data_type()).nullable(e.is_nullable());
            match e {
                Expression::GetField { index, .. } => match child_schema.get(*index) {
                    Some(source) => column.with_source(source.source.clone()),
                    None => column,
                },
                _ => column,
            }
        })
        .collect()
}
