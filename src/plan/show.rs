//! Introspection nodes: DESCRIBE, SHOW TABLES and SHOW CREATE TABLE.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::{Column, DataType, Database, Row, Schema, Table};

/// Schema of `DESCRIBE`.
pub fn describe_schema() -> Schema {
    Schema::new(vec![
        Column::new("name", DataType::Text),
        Column::new("type", DataType::Text),
    ])
}

/// One `(name, type)` row per column.
pub fn describe_rows(schema: &Schema) -> Vec<Row> {
    schema
        .iter()
        .map(|c| vec![Value::from(c.name.clone()), Value::from(c.data_type.sql_name())])
        .collect()
}

/// Database bound to a `SHOW TABLES` node.
#[derive(Clone)]
pub struct DatabaseRef(pub Arc<dyn Database>);

impl PartialEq for DatabaseRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatabaseRef").field(&self.0.name()).finish()
    }
}

/// `SHOW TABLES [FROM db]`. Resolved once bound to a database.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowTables {
    /// Explicit database, or the context's current database when `None`.
    pub database: Option<String>,
    pub bound: Option<DatabaseRef>,
}

impl ShowTables {
    pub fn new(database: Option<String>) -> Self {
        Self {
            database,
            bound: None,
        }
    }

    pub fn bind(&self, database: Arc<dyn Database>) -> Self {
        Self {
            database: self.database.clone(),
            bound: Some(DatabaseRef(database)),
        }
    }

    pub fn resolved(&self) -> bool {
        self.bound.is_some()
    }

    pub fn schema() -> Schema {
        Schema::new(vec![Column::new("Table", DataType::Text)])
    }

    /// Table names in name order.
    pub fn rows(&self) -> Vec<Row> {
        match &self.bound {
            Some(DatabaseRef(db)) => db
                .tables()
                .into_keys()
                .map(|name| vec![Value::from(name)])
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Schema of `SHOW CREATE TABLE`.
pub fn show_create_table_schema() -> Schema {
    Schema::new(vec![
        Column::new("Table", DataType::Text),
        Column::new("Create Table", DataType::Text),
    ])
}

/// Single row holding the table name and its `CREATE TABLE` statement.
pub fn show_create_table_rows(table: &dyn Table) -> Vec<Row> {
    vec![vec![
        Value::from(table.name()),
        Value::from(create_table_statement(table.name(), table.schema())),
    ]]
}

fn create_table_statement(name: &str, schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .iter()
        .map(|column| {
            let mut def = format!("  `{}` {}", column.name, column.data_type.sql_name());
            if !column.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                def.push_str(&format!(" DEFAULT {}", sql_literal(default)));
            }
            def
        })
        .collect();

    format!(
        "CREATE TABLE `{}` (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        name,
        columns.join(",\n")
    )
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MemDatabase, MemTable};
    use serde_json::json;

    #[test]
    fn test_describe_rows() {
        let schema = Schema::new(vec![
            Column::new("name", DataType::Text),
            Column::new("age", DataType::Int32),
        ]);
        assert_eq!(
            describe_rows(&schema),
            vec![vec![json!("name"), json!("TEXT")], vec![json!("age"), json!("INT")]]
        );
    }

    #[test]
    fn test_show_tables_sorted() {
        let db = MemDatabase::new("mydb");
        db.add_table(Arc::new(MemTable::new("zeta", Schema::empty())));
        db.add_table(Arc::new(MemTable::new("alpha", Schema::empty())));

        let node = ShowTables::new(None);
        assert!(!node.resolved());
        let node = node.bind(Arc::new(db));
        assert!(node.resolved());
        assert_eq!(node.rows(), vec![vec![json!("alpha")], vec![json!("zeta")]]);
    }

    #[test]
    fn test_create_table_statement() {
        let table = MemTable::new(
            "mytable",
            Schema::new(vec![
                Column::new("name", DataType::Text),
                Column::new("email", DataType::Text)
                    .nullable(true)
                    .with_default(json!("n/a")),
            ]),
        );
        let rows = show_create_table_rows(&table);
        assert_eq!(rows[0][0], json!("mytable"));
        assert_eq!(
            rows[0][1],
            json!(
                "CREATE TABLE `mytable` (\n  `name` TEXT NOT NULL,\n  `email` TEXT DEFAULT 'n/a'\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
            )
        );
    }
}
