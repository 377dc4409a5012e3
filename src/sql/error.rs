//! Errors raised while turning SQL text into an unresolved plan.

use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Rejected by the SQL grammar itself.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Valid SQL with no plan node to build it from.
    #[error("statement not supported by this engine: {0}")]
    UnsupportedStatement(String),

    #[error("expression not supported by this engine: {0}")]
    UnsupportedExpression(String),

    /// A qualified or quoted name the plan cannot represent.
    #[error("cannot bind name {0}")]
    InvalidIdentifier(String),

    #[error("statement requires a {0}")]
    MissingClause(String),

    #[error("query is empty")]
    EmptyQuery,

    #[error("expected a single statement per query")]
    MultipleStatements,

    /// `KILL [QUERY | CONNECTION] <id>` with a malformed shape or id.
    #[error("invalid KILL statement: {0}")]
    InvalidKill(String),
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ParseError::InvalidKill("KILL QUERY x".into()).to_string(),
            "invalid KILL statement: KILL QUERY x"
        );
        assert_eq!(
            ParseError::MissingClause("FROM".into()).to_string(),
            "statement requires a FROM"
        );
        assert_eq!(ParseError::EmptyQuery.to_string(), "query is empty");
    }

    #[test]
    fn test_from_parser_error() {
        let err: ParseError =
            sqlparser::parser::ParserError::ParserError("unexpected token".into()).into();
        assert!(matches!(err, ParseError::Syntax(msg) if msg.contains("unexpected token")));
    }
}
