//! In-memory tables and databases.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::schema::{Row, Schema};
use super::table::{Database, Table};
use crate::error::{Error, Result};
use crate::plan::{RowIter, RowsIter};

/// A table holding its rows in memory.
#[derive(Debug)]
pub struct MemTable {
    name: String,
    schema: Schema,
    rows: RwLock<Vec<Row>>,
}

impl MemTable {
    /// Create an empty table. Columns are tagged with the table name.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        Self {
            schema: schema.with_source(&name),
            name,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Append a row after checking it against the schema.
    pub fn insert(&self, row: Row) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(Error::InvalidRow(format!(
                "insert into {} expected {} values, got {}",
                self.name,
                self.schema.len(),
                row.len()
            )));
        }

        for (column, value) in self.schema.iter().zip(&row) {
            if !column.check(value) {
                return Err(Error::InvalidRow(format!(
                    "column '{}' expects {}{}, got {}",
                    column.name,
                    column.data_type,
                    if column.nullable { "" } else { " NOT NULL" },
                    value
                )));
            }
        }

        self.rows.write().push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl Table for MemTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_iter(&self) -> Result<Box<dyn RowIter>> {
        // Snapshot so inserts during iteration are not observed.
        Ok(Box::new(RowsIter::new(self.rows.read().clone())))
    }
}

/// A database holding its tables in memory.
#[derive(Default)]
pub struct MemDatabase {
    name: String,
    tables: RwLock<BTreeMap<String, Arc<dyn Table>>>,
}

impl MemDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a table under its own name, replacing any previous one.
    pub fn add_table(&self, table: Arc<dyn Table>) {
        self.tables.write().insert(table.name().to_string(), table);
    }
}

impl Database for MemDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> BTreeMap<String, Arc<dyn Table>> {
        self.tables.read().clone()
    }

    fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables.read().get(name).cloned()
    }
}

impl std::fmt::Debug for MemDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemDatabase")
            .field("name", &self.name)
            .field("tables", &self.tables.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::plan::collect_rows;
    use serde_json::json;

    fn people() -> MemTable {
        MemTable::new(
            "people",
            Schema::new(vec![
                Column::new("name", DataType::Text),
                Column::new("age", DataType::Int32).nullable(true),
            ]),
        )
    }

    #[test]
    fn test_insert_and_iterate_in_order() {
        let table = people();
        table.insert(vec![json!("ann"), json!(31)]).unwrap();
        table.insert(vec![json!("bob"), json!(null)]).unwrap();

        let rows = collect_rows(table.row_iter().unwrap()).unwrap();
        assert_eq!(rows, vec![vec![json!("ann"), json!(31)], vec![json!("bob"), json!(null)]]);
        assert_eq!(table.schema()[0].source, "people");
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let table = people();
        assert!(matches!(table.insert(vec![json!("ann")]), Err(Error::InvalidRow(_))));
        assert!(matches!(
            table.insert(vec![json!(null), json!(1)]),
            Err(Error::InvalidRow(_))
        ));
        assert!(matches!(
            table.insert(vec![json!("ann"), json!("old")]),
            Err(Error::InvalidRow(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_database_tables() {
        let db = MemDatabase::new("mydb");
        db.add_table(Arc::new(people()));

        assert_eq!(db.name(), "mydb");
        assert!(db.table("people").is_some());
        assert!(db.table("People").is_none());
        assert_eq!(db.tables().keys().collect::<Vec<_>>(), vec!["people"]);
    }
}
