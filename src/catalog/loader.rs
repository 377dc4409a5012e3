//! JSON database fixtures.
//!
//! A fixture describes one database:
//!
//! ```json
//! {
//!   "name": "mydb",
//!   "tables": [
//!     {
//!       "name": "mytable",
//!       "schema": [{"name": "name", "type": "text"}],
//!       "rows": [["John Doe"]]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::memory::{MemDatabase, MemTable};
use super::schema::{Row, Schema};
use crate::error::Result;

/// A database described as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseFixture {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableFixture>,
}

/// A table described as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFixture {
    pub name: String,
    pub schema: Schema,
    #[serde(default)]
    pub rows: Vec<Row>,
}

impl DatabaseFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Build an in-memory database, validating every row.
    pub fn build(&self) -> Result<Arc<MemDatabase>> {
        let db = MemDatabase::new(&self.name);
        for fixture in &self.tables {
            let table = MemTable::new(&fixture.name, fixture.schema.clone());
            for row in &fixture.rows {
                table.insert(row.clone())?;
            }
            debug!(
                "loaded table {}.{} with {} rows",
                self.name,
                fixture.name,
                table.len()
            );
            db.add_table(Arc::new(table));
        }
        Ok(Arc::new(db))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Database;
    use crate::error::Error;
    use serde_json::json;

    const FIXTURE: &str = r#"{
        "name": "mydb",
        "tables": [
            {
                "name": "mytable",
                "schema": [
                    {"name": "name", "type": "text"},
                    {"name": "email", "type": "text", "nullable": true}
                ],
                "rows": [["John Doe", "john@doe.com"], ["Jane Doe", null]]
            },
            {"name": "empty", "schema": [{"name": "i", "type": "int32"}]}
        ]
    }"#;

    #[test]
    fn test_build_fixture() {
        let db = DatabaseFixture::from_json(FIXTURE).unwrap().build().unwrap();
        assert_eq!(db.name(), "mydb");
        assert_eq!(db.tables().len(), 2);

        let table = db.table("mytable").unwrap();
        assert_eq!(table.schema().column_names(), vec!["name", "email"]);
        assert_eq!(table.schema()[1].source, "mytable");

        let rows = crate::plan::collect_rows(table.row_iter().unwrap()).unwrap();
        assert_eq!(rows[1], vec![json!("Jane Doe"), json!(null)]);
    }

    #[test]
    fn test_invalid_rows_rejected() {
        let mut fixture = DatabaseFixture::from_json(FIXTURE).unwrap();
        fixture.tables[0].rows.push(vec![json!(1), json!("x")]);
        assert!(matches!(fixture.build(), Err(Error::InvalidRow(_))));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, FIXTURE.as_bytes()).unwrap();

        let fixture = DatabaseFixture::from_path(file.path()).unwrap();
        assert_eq!(fixture.tables[0].rows.len(), 2);
        assert!(matches!(
            DatabaseFixture::from_path(file.path().with_extension("missing")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DatabaseFixture::from_json("{\"tables\": []}"),
            Err(Error::Json(_))
        ));
    }
}
