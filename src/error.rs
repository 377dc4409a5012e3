//! Engine errors.

use thiserror::Error;

use crate::sql::ParseError;

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The query text could not be turned into a plan.
    Parse,
    /// A database, table, column or function reference did not resolve.
    Resolution,
    /// The plan is well formed but semantically invalid.
    Validation,
    /// The analyzer rewrite loop hit its pass cap.
    NonConvergence,
    /// A row could not be evaluated.
    Evaluation,
    /// Catalog registration or table mutation failed.
    Catalog,
    /// The query was killed.
    Cancelled,
    /// Broken invariant or I/O failure.
    Internal,
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("database not found: {0}")]
    DatabaseNotFound(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("ambiguous column: {0}")]
    AmbiguousColumn(String),

    #[error("function not found: {0}")]
    FunctionNotFound(String),

    #[error("invalid arguments for {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("analysis did not converge after {0} passes")]
    NonConvergence(usize),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("field index {index} out of range for row of {width} values")]
    FieldOutOfRange { index: usize, width: usize },

    #[error("cannot evaluate unresolved expression: {0}")]
    Unresolved(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("database already registered: {0}")]
    DuplicateDatabase(String),

    #[error("function already registered: {0}")]
    DuplicateFunction(String),

    #[error("query not found: {0}")]
    QueryNotFound(u64),

    #[error("query cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) => ErrorKind::Parse,
            Error::DatabaseNotFound(_)
            | Error::TableNotFound(_)
            | Error::ColumnNotFound(_)
            | Error::AmbiguousColumn(_)
            | Error::FunctionNotFound(_)
            | Error::InvalidArguments { .. } => ErrorKind::Resolution,
            Error::Validation(_) => ErrorKind::Validation,
            Error::NonConvergence(_) => ErrorKind::NonConvergence,
            Error::TypeMismatch { .. } | Error::FieldOutOfRange { .. } | Error::Unresolved(_) => {
                ErrorKind::Evaluation
            }
            Error::InvalidRow(_)
            | Error::DuplicateDatabase(_)
            | Error::DuplicateFunction(_)
            | Error::QueryNotFound(_) => ErrorKind::Catalog,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Io(_) | Error::Json(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn type_mismatch(expected: impl Into<String>, actual: &serde_json::Value) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::TableNotFound("t".into()).kind(), ErrorKind::Resolution);
        assert_eq!(Error::ColumnNotFound("c".into()).kind(), ErrorKind::Resolution);
        assert_eq!(Error::Validation("v".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::NonConvergence(1000).kind(), ErrorKind::NonConvergence);
        assert_eq!(
            Error::FieldOutOfRange { index: 3, width: 1 }.kind(),
            ErrorKind::Evaluation
        );
        assert_eq!(Error::Cancelled.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = Error::type_mismatch("TIMESTAMP", &json!("nope"));
        assert_eq!(err.to_string(), "type mismatch: expected TIMESTAMP, got \"nope\"");
    }
}
