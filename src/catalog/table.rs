//! Storage collaborator interfaces.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::schema::Schema;
use crate::error::Result;
use crate::plan::RowIter;

/// A named source of rows.
pub trait Table: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &Schema;

    /// Iterate over every stored row once, in storage order.
    fn row_iter(&self) -> Result<Box<dyn RowIter>>;
}

/// A named collection of tables with unique names.
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    fn tables(&self) -> BTreeMap<String, Arc<dyn Table>>;

    /// Look up a table by exact name.
    fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables().get(name).cloned()
    }
}
