//! Columns, schemas and rows.

use std::ops::Index;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::DataType;

/// A row is one value per schema column, by position.
pub type Row = Vec<Value>;

/// A column of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Data type.
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Default value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Name of the table the column belongs to, empty for computed columns.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
}

impl Column {
    /// Create a new non-nullable column.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            default: None,
            source: String::new(),
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Check a value against this column's type and nullability.
    pub fn check(&self, value: &Value) -> bool {
        if value.is_null() {
            self.nullable
        } else {
            self.data_type.matches(value)
        }
    }
}

/// Ordered list of columns. Order defines the positional layout of rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// This schema followed by `other`.
    pub fn concat(&self, other: &Schema) -> Schema {
        self.columns.iter().chain(other.columns.iter()).cloned().collect()
    }

    /// Same columns with `source` set to `table`.
    pub fn with_source(self, table: &str) -> Schema {
        self.columns.into_iter().map(|c| c.with_source(table)).collect()
    }
}

impl FromIterator<Column> for Schema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Column>> for Schema {
    fn from(columns: Vec<Column>) -> Self {
        Self { columns }
    }
}

impl Index<usize> for Schema {
    type Output = Column;

    fn index(&self, index: usize) -> &Column {
        &self.columns[index]
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_check() {
        let col = Column::new("name", DataType::Text);
        assert!(col.check(&json!("Alice")));
        assert!(!col.check(&json!(123)));
        assert!(!col.check(&json!(null)));

        let nullable = Column::new("nickname", DataType::Text).nullable(true);
        assert!(nullable.check(&json!(null)));
    }

    #[test]
    fn test_schema_concat_preserves_order() {
        let left = Schema::new(vec![Column::new("a", DataType::Int32)]);
        let right = Schema::new(vec![
            Column::new("b", DataType::Text),
            Column::new("c", DataType::Boolean),
        ]);
        let joined = left.concat(&right);
        assert_eq!(joined.column_names(), vec!["a", "b", "c"]);
        assert_eq!(joined[2].data_type, DataType::Boolean);
    }

    #[test]
    fn test_schema_deserialize() {
        let schema: Schema = serde_json::from_value(json!([
            {"name": "id", "type": "int64"},
            {"name": "email", "type": "text", "nullable": true, "default": "none"}
        ]))
        .unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].data_type, DataType::Int64);
        assert!(!schema[0].nullable);
        assert!(schema[1].nullable);
        assert_eq!(schema[1].default, Some(json!("none")));
    }
}
