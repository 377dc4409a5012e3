//! Catalog module: databases, tables, schemas and the function registry.
//!
//! Tables and databases are consumed through the [`Table`] and [`Database`]
//! traits; [`MemTable`] and [`MemDatabase`] are the in-memory implementations
//! used by the engine and its tests.

mod loader;
mod manager;
mod memory;
mod schema;
mod table;
mod types;

pub use loader::{DatabaseFixture, TableFixture};
pub use manager::{Catalog, FunctionConstructor};
pub use memory::{MemDatabase, MemTable};
pub use schema::{Column, Row, Schema};
pub use table::{Database, Table};
pub use types::{to_date, to_timestamp, DataType};
