//! Query result types.

use serde_json::{Map, Value};

use crate::catalog::{Row, Schema};

/// Collected output of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// A result with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Schema::empty(), Vec::new())
    }

    /// Column names in order.
    pub fn columns(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Rows as JSON objects keyed by column name. Later columns win on
    /// duplicate names.
    pub fn to_objects(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.schema
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), v.clone()))
                    .collect()
            })
            .collect()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use serde_json::json;

    #[test]
    fn test_result_set() {
        let rs = ResultSet::new(
            Schema::new(vec![
                Column::new("name", DataType::Text),
                Column::new("n", DataType::Int64),
            ]),
            vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]],
        );
        assert_eq!(rs.columns(), vec!["name", "n"]);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.get(1), Some(&vec![json!("b"), json!(2)]));
        assert_eq!(
            Value::Object(rs.to_objects().remove(0)),
            json!({"name": "a", "n": 1})
        );
        assert!(ResultSet::empty().is_empty());
    }
}
