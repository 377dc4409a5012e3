//! Pull-based row iterators.
//!
//! Each plan node produces a [`RowIter`] that pulls rows one at a time from
//! its children's iterators. Exhaustion is `Ok(None)`, never an error.

use serde_json::Value;

use crate::catalog::Row;
use crate::error::Result;
use crate::expression::Expression;
use crate::session::Context;

/// Pull-based row source.
///
/// Iterators are single-consumer. `close` releases held resources, is
/// propagated to every child and is safe to call at any point.
pub trait RowIter: Send {
    /// Get the next row, or None if exhausted.
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release resources held by this iterator and its children.
    fn close(&mut self) -> Result<()>;
}

/// Drain an iterator, closing it on every exit path.
pub fn collect_rows(mut iter: Box<dyn RowIter>) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let drained = loop {
        match iter.next_row() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    let closed = iter.close();
    drained?;
    closed?;
    Ok(rows)
}

/// Iterator over materialized rows.
#[derive(Debug, Default)]
pub struct RowsIter {
    rows: std::vec::IntoIter<Row>,
}

impl RowsIter {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Iterator that yields nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl RowIter for RowsIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        self.rows = Vec::new().into_iter();
        Ok(())
    }
}

/// Checks the query's cancellation flag before every pull.
pub struct CancellableIter {
    ctx: Context,
    source: Box<dyn RowIter>,
}

impl CancellableIter {
    pub fn new(ctx: Context, source: Box<dyn RowIter>) -> Self {
        Self { ctx, source }
    }
}

impl RowIter for CancellableIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.ctx.check()?;
        self.source.next_row()
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Evaluates a list of expressions per child row.
pub struct ProjectIter {
    ctx: Context,
    source: Box<dyn RowIter>,
    expressions: Vec<Expression>,
}

impl ProjectIter {
    pub fn new(ctx: Context, source: Box<dyn RowIter>, expressions: Vec<Expression>) -> Self {
        Self {
            ctx,
            source,
            expressions,
        }
    }
}

impl RowIter for ProjectIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        match self.source.next_row()? {
            Some(row) => {
                let projected = self
                    .expressions
                    .iter()
                    .map(|e| e.eval(&self.ctx, &row))
                    .collect::<Result<Row>>()?;
                Ok(Some(projected))
            }
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Yields child rows whose predicate is definitely true.
pub struct FilterIter {
    ctx: Context,
    source: Box<dyn RowIter>,
    predicate: Expression,
}

impl FilterIter {
    pub fn new(ctx: Context, source: Box<dyn RowIter>, predicate: Expression) -> Self {
        Self {
            ctx,
            source,
            predicate,
        }
    }
}

impl RowIter for FilterIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.source.next_row()? {
            if self.predicate.eval(&self.ctx, &row)? == Value::Bool(true) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Yields at most `limit` rows without pulling past them.
pub struct LimitIter {
    source: Box<dyn RowIter>,
    limit: usize,
    current: usize,
}

impl LimitIter {
    pub fn new(source: Box<dyn RowIter>, limit: usize) -> Self {
        Self {
            source,
            limit,
            current: 0,
        }
    }
}

impl RowIter for LimitIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.current >= self.limit {
            return Ok(None);
        }

        match self.source.next_row()? {
            Some(row) => {
                self.current += 1;
                Ok(Some(row))
            }
            None => {
                self.current = self.limit;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Skips the first `offset` rows.
pub struct OffsetIter {
    source: Box<dyn RowIter>,
    offset: usize,
    skipped: usize,
}

impl OffsetIter {
    pub fn new(source: Box<dyn RowIter>, offset: usize) -> Self {
        Self {
            source,
            offset,
            skipped: 0,
        }
    }
}

impl RowIter for OffsetIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        while self.skipped < self.offset {
            if self.source.next_row()?.is_none() {
                return Ok(None);
            }
            self.skipped += 1;
        }
        self.source.next_row()
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Cartesian product. The right side is read once and replayed for every
/// left row.
pub struct CrossJoinIter {
    left: Box<dyn RowIter>,
    right: Option<Box<dyn RowIter>>,
    right_rows: Vec<Row>,
    current: Option<Row>,
    position: usize,
}

impl CrossJoinIter {
    pub fn new(left: Box<dyn RowIter>, right: Box<dyn RowIter>) -> Self {
        Self {
            left,
            right: Some(right),
            right_rows: Vec::new(),
            current: None,
            position: 0,
        }
    }

    fn load_right(&mut self) -> Result<()> {
        if let Some(mut right) = self.right.take() {
            loop {
                match right.next_row() {
                    Ok(Some(row)) => self.right_rows.push(row),
                    Ok(None) => break,
                    Err(err) => {
                        right.close()?;
                        return Err(err);
                    }
                }
            }
            right.close()?;
        }
        Ok(())
    }
}

impl RowIter for CrossJoinIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        self.load_right()?;
        if self.right_rows.is_empty() {
            return Ok(None);
        }

        loop {
            if let Some(left) = &self.current {
                if let Some(right) = self.right_rows.get(self.position) {
                    self.position += 1;
                    let mut row = left.clone();
                    row.extend(right.iter().cloned());
                    return Ok(Some(row));
                }
            }

            match self.left.next_row()? {
                Some(row) => {
                    self.current = Some(row);
                    self.position = 0;
                }
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let left = self.left.close();
        if let Some(mut right) = self.right.take() {
            right.close()?;
        }
        left
    }
}
