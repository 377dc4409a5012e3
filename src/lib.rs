//! An in-memory SQL engine.
//!
//! SQL text is parsed into an unresolved plan tree, rewritten by a
//! rule-based analyzer until every table, column and function reference is
//! bound to the catalog, and then executed through pull-based row
//! iterators.
//!
//! # Example
//!
//! ```no_run
//! use sqlengine::catalog::DatabaseFixture;
//! use sqlengine::Engine;
//!
//! let engine = Engine::new().unwrap();
//! let db = DatabaseFixture::from_path("mydb.json").unwrap().build().unwrap();
//! engine.add_database(db).unwrap();
//!
//! let rs = engine
//!     .query_all(&engine.context(), "SELECT name, count(*) FROM mytable GROUP BY name")
//!     .unwrap();
//! ```

pub mod analyzer;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod expression;
pub mod plan;
pub mod repl;
pub mod session;
pub mod sql;

pub use analyzer::{AnalyzeError, Analyzer, Rule, ValidationRule};
pub use engine::{Engine, EngineConfig, ResultSet};
pub use error::{Error, ErrorKind, Result};
pub use plan::{Node, RowIter};
pub use session::{Context, KillHandle};
