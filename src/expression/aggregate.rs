//! Aggregate functions and their accumulators.

use std::cmp::Ordering;

use serde_json::Value;

use crate::catalog::{DataType, Row};
use crate::error::{Error, Result};
use crate::session::Context;

use super::Expression;

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    /// Result type given the argument type.
    pub fn data_type(&self, input: DataType) -> DataType {
        match self {
            AggregateFunction::Count => DataType::Int64,
            AggregateFunction::Sum | AggregateFunction::Avg => DataType::Float64,
            AggregateFunction::Min | AggregateFunction::Max => input,
        }
    }
}

/// Running state of one aggregate over one group.
#[derive(Debug, Clone)]
pub struct Accumulator {
    function: AggregateFunction,
    child: Expression,
    count: i64,
    sum: f64,
    extreme: Value,
}

impl Accumulator {
    /// Accumulator for an aggregate expression, looking through aliases.
    pub fn new(expr: &Expression) -> Result<Self> {
        match expr {
            Expression::Aggregate { function, child } => Ok(Self {
                function: *function,
                child: (**child).clone(),
                count: 0,
                sum: 0.0,
                extreme: Value::Null,
            }),
            Expression::Alias { child, .. } => Self::new(child),
            other => Err(Error::Internal(format!("{} is not an aggregate", other))),
        }
    }

    /// Feed one member row of the group.
    pub fn update(&mut self, ctx: &Context, row: &Row) -> Result<()> {
        if self.child == Expression::Star {
            self.count += 1;
            return Ok(());
        }

        let value = self.child.eval(ctx, row)?;
        if value.is_null() {
            return Ok(());
        }

        self.count += 1;
        match self.function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => {
                self.sum += value
                    .as_f64()
                    .ok_or_else(|| Error::type_mismatch(DataType::Float64.sql_name(), &value))?;
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let wanted = if self.function == AggregateFunction::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                if self.extreme.is_null()
                    || self.child.data_type().compare(&value, &self.extreme)? == wanted
                {
                    self.extreme = value;
                }
            }
        }
        Ok(())
    }

    /// Final value. Empty groups yield 0 for count and NULL otherwise.
    pub fn finish(&self) -> Value {
        match self.function {
            AggregateFunction::Count => Value::from(self.count),
            _ if self.count == 0 => Value::Null,
            AggregateFunction::Sum => Value::from(self.sum),
            AggregateFunction::Avg => Value::from(self.sum / self.count as f64),
            AggregateFunction::Min | AggregateFunction::Max => self.extreme.clone(),
        }
    }
}
