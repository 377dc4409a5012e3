//! Grouping and aggregation.

use std::collections::HashMap;

use serde_json::Value;

use super::iter::RowIter;
use crate::catalog::Row;
use crate::error::Result;
use crate::expression::{Accumulator, Expression};
use crate::session::Context;

/// One group: its first-seen member row and an accumulator per aggregate
/// expression (`None` for plain expressions).
struct Group {
    representative: Row,
    accumulators: Vec<Option<Accumulator>>,
}

/// Groups child rows by the grouping expressions and emits one row per
/// group, in first-seen order.
///
/// The child is drained on the first pull.
pub struct GroupByIter {
    ctx: Context,
    source: Box<dyn RowIter>,
    aggregate: Vec<Expression>,
    grouping: Vec<Expression>,
    output: Option<std::vec::IntoIter<Row>>,
}

impl GroupByIter {
    pub fn new(
        ctx: Context,
        source: Box<dyn RowIter>,
        aggregate: Vec<Expression>,
        grouping: Vec<Expression>,
    ) -> Self {
        Self {
            ctx,
            source,
            aggregate,
            grouping,
            output: None,
        }
    }

    fn materialize(&mut self) -> Result<Vec<Row>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        while let Some(row) = self.source.next_row()? {
            let key = self
                .grouping
                .iter()
                .map(|e| e.eval(&self.ctx, &row))
                .collect::<Result<Vec<Value>>>()?;
            let key = serde_json::to_string(&group_key(key))?;

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    let accumulators = self
                        .aggregate
                        .iter()
                        .map(|e| {
                            if e.is_aggregate() {
                                Accumulator::new(e).map(Some)
                            } else {
                                Ok(None)
                            }
                        })
                        .collect::<Result<Vec<_>>>()?;
                    groups.push(Group {
                        representative: row.clone(),
                        accumulators,
                    });
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            for acc in groups[slot].accumulators.iter_mut().flatten() {
                acc.update(&self.ctx, &row)?;
            }
        }

        if groups.is_empty() && self.grouping.is_empty() {
            return self
                .aggregate
                .iter()
                .map(|e| {
                    if e.is_aggregate() {
                        Ok(Accumulator::new(e)?.finish())
                    } else {
                        Ok(Value::Null)
                    }
                })
                .collect::<Result<Row>>()
                .map(|row| vec![row]);
        }

        groups
            .into_iter()
            .map(|group| {
                self.aggregate
                    .iter()
                    .zip(&group.accumulators)
                    .map(|(expr, acc)| match acc {
                        Some(acc) => Ok(acc.finish()),
                        None => expr.eval(&self.ctx, &group.representative),
                    })
                    .collect::<Result<Row>>()
            })
            .collect()
    }
}

/// Numerically equal values share a key: `1` and `1.0` group together.
fn group_key(values: Vec<Value>) -> Vec<Value> {
    values
        .into_iter()
        .map(|v| match v {
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Value::from(i),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Value::from(f as i64)
                }
                _ => Value::Number(n),
            },
            other => other,
        })
        .collect()
}

impl RowIter for GroupByIter {
    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.output.is_none() {
            let rows = self.materialize()?;
            self.output = Some(rows.into_iter());
        }
        Ok(self.output.as_mut().and_then(|rows| rows.next()))
    }

    fn close(&mut self) -> Result<()> {
        self.output = Some(Vec::new().into_iter());
        self.source.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::expression::AggregateFunction;
    use crate::plan::{collect_rows, RowsIter};
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            vec![json!("b"), json!(2)],
            vec![json!("a"), json!(1)],
            vec![json!("b"), json!(5)],
            vec![json!("a"), json!(3)],
        ]
    }

    #[test]
    fn test_groups_in_first_seen_order() {
        let name = Expression::get_field(0, DataType::Text, "name", false);
        let n = Expression::get_field(1, DataType::Int64, "n", false);
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::new(rows())),
            vec![
                name.clone(),
                Expression::count_star(),
                Expression::aggregate(AggregateFunction::Sum, n.clone()),
                Expression::aggregate(AggregateFunction::Max, n),
            ],
            vec![name],
        );

        assert_eq!(
            collect_rows(Box::new(iter)).unwrap(),
            vec![
                vec![json!("b"), json!(2), json!(7.0), json!(5)],
                vec![json!("a"), json!(2), json!(4.0), json!(3)],
            ]
        );
    }

    #[test]
    fn test_plain_expression_uses_first_row() {
        let name = Expression::get_field(0, DataType::Text, "name", false);
        let n = Expression::get_field(1, DataType::Int64, "n", false);
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::new(rows())),
            vec![n],
            vec![name],
        );
        assert_eq!(
            collect_rows(Box::new(iter)).unwrap(),
            vec![vec![json!(2)], vec![json!(1)]]
        );
    }

    #[test]
    fn test_no_grouping_is_one_group() {
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::new(rows())),
            vec![Expression::count_star()],
            vec![],
        );
        assert_eq!(collect_rows(Box::new(iter)).unwrap(), vec![vec![json!(4)]]);
    }

    #[test]
    fn test_numerically_equal_keys_share_a_group() {
        let f = Expression::get_field(0, DataType::Float64, "f", false);
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::new(vec![
                vec![json!(1)],
                vec![json!(1.0)],
                vec![json!(2.5)],
                vec![json!(2.5)],
            ])),
            vec![f.clone(), Expression::count_star()],
            vec![f],
        );
        assert_eq!(
            collect_rows(Box::new(iter)).unwrap(),
            vec![vec![json!(1), json!(2)], vec![json!(2.5), json!(2)]]
        );
    }

    #[test]
    fn test_empty_input_without_grouping() {
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::empty()),
            vec![Expression::count_star()],
            vec![],
        );
        assert_eq!(collect_rows(Box::new(iter)).unwrap(), vec![vec![json!(0)]]);

        let name = Expression::get_field(0, DataType::Text, "name", false);
        let iter = GroupByIter::new(
            Context::default(),
            Box::new(RowsIter::empty()),
            vec![Expression::count_star()],
            vec![name],
        );
        assert!(collect_rows(Box::new(iter)).unwrap().is_empty());
    }
}
