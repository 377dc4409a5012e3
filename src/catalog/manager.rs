//! Catalog of databases and functions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use super::table::{Database, Table};
use crate::error::{Error, Result};
use crate::expression::Expression;

/// Builds a function expression from its argument expressions.
pub type FunctionConstructor = Arc<dyn Fn(Vec<Expression>) -> Result<Expression> + Send + Sync>;

/// Registry of databases and built-in functions.
///
/// Registration is append-only and meant to happen at startup. The catalog
/// holds no per-query state; the current database travels in the query's
/// [`Context`](crate::session::Context).
#[derive(Default)]
pub struct Catalog {
    databases: RwLock<Vec<Arc<dyn Database>>>,
    functions: RwLock<BTreeMap<String, FunctionConstructor>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database. Names must be unique.
    pub fn add_database(&self, database: Arc<dyn Database>) -> Result<()> {
        let mut databases = self.databases.write();
        if databases.iter().any(|db| db.name() == database.name()) {
            return Err(Error::DuplicateDatabase(database.name().to_string()));
        }

        debug!("registered database {}", database.name());
        databases.push(database);
        Ok(())
    }

    /// Get a database by name.
    pub fn database(&self, name: &str) -> Option<Arc<dyn Database>> {
        self.databases.read().iter().find(|db| db.name() == name).cloned()
    }

    /// All databases in registration order.
    pub fn databases(&self) -> Vec<Arc<dyn Database>> {
        self.databases.read().clone()
    }

    /// Look up `table` in `database`.
    pub fn table(&self, database: &str, table: &str) -> Result<Arc<dyn Table>> {
        let db = self
            .database(database)
            .ok_or_else(|| Error::DatabaseNotFound(database.to_string()))?;
        db.table(table)
            .ok_or_else(|| Error::TableNotFound(table.to_string()))
    }

    /// Register a function constructor under `name`. Names must be unique.
    pub fn register_function<F>(&self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(Vec<Expression>) -> Result<Expression> + Send + Sync + 'static,
    {
        let mut functions = self.functions.write();
        if functions.contains_key(name) {
            return Err(Error::DuplicateFunction(name.to_string()));
        }

        debug!("registered function {}", name);
        functions.insert(name.to_string(), Arc::new(constructor));
        Ok(())
    }

    /// Get a function constructor by name.
    pub fn function(&self, name: &str) -> Option<FunctionConstructor> {
        self.functions.read().get(name).cloned()
    }

    /// Registered function names in order.
    pub fn function_names(&self) -> Vec<String> {
        self.functions.read().keys().cloned().collect()
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let databases: Vec<String> = self
            .databases
            .read()
            .iter()
            .map(|db| db.name().to_string())
            .collect();
        f.debug_struct("Catalog")
            .field("databases", &databases)
            .field("functions", &self.function_names())
            .finish()
    }
}
