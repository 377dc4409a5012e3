//! SQL front-end.
//!
//! Uses the `sqlparser` crate for syntax, then builds the unresolved plan
//! tree the analyzer consumes: tables and columns by name, wildcards left
//! unexpanded and functions unbound.

mod error;
mod parser;

pub use error::{ParseError, ParseResult};
pub use parser::{parse, Parser};
