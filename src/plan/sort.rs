//! Sorting.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use super::iter::RowIter;
use crate::catalog::Row;
use crate::error::Result;
use crate::expression::Expression;
use crate::session::Context;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// An expression to sort by and its direction.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub expression: Expression,
    pub order: SortOrder,
}

impl SortField {
    pub fn asc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        Self {
            expression,
            order: SortOrder::Descending,
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Ascending => write!(f, "{} ASC", self.expression),
            SortOrder::Descending => write!(f, "{} DESC", self.expression),
        }
    }
}

/// Materializes the child and yields its rows in sort order. Ties keep
/// their input order.
pub struct SortIter {
    ctx: Context,
    source: Box<dyn RowIter>,
    fields: Vec<SortField>,
    sorted: Option<std::vec::IntoIter<Row>>,
}

impl SortIter {
    pub fn new(ctx: Context, source: Box<dyn RowIter>, fields: Vec<SortField>) -> Self {
        Self {
            ctx,
            source,
            fields,
            sorted: None,
        }
    }

    fn materialize(&mut self) -> Result<Vec<Row>> {
        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
        while let Some(row) = self.source.next_row()? {
            let key = self
                .fields
                .iter()
                .map(|field| field.expression.eval(&self.ctx, &row))
                .collect::<Result<Vec<Value>>>()?;
            keyed.push((key, row));
        }

        // sort_by is stable; the first comparison error is kept and reported.
        let mut failure = None;
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, field) in self.fields.iter().enumerate() {
                let ordering = match field.expression.data_type().compare(&a[i], &b[i]) {
                    Ok(ordering) => ordering,
                    Err(err) => {
                        failure.get_or_insert(err);
                        Ordering::Equal
                    }
                };
                if ordering != Ordering::Equal {
                    return match field.order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    };
                }
            }
            Ordering::Equal
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(keyed.into_iter().map(|(_, row)| row).collect()),
        }
    }
}

impl RowIter for SortIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.sorted.is_none() {
            let rows = self.materialize()?;
            self.sorted = Some(rows.into_iter());
        }
        Ok(self.sorted.as_mut().and_then(|rows| rows.next()))
    }

    fn close(&mut self) -> Result<()> {
        self.sorted = Some(Vec::new().into_iter());
        self.source.close()
    }
}
