//! Blob tag predicates, as used by `x-ms-if-tags` and tag filtering.

mod ast;
mod parser;

pub use ast::*;
pub use parser::{parse, MAX_LOGICAL_OPERATORS, MAX_NESTING_DEPTH};

use thiserror::Error;

use crate::error::{ErrorCode, StorageError};

/// Malformed tag predicate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("the expression is empty")]
    Empty,
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unterminated {kind} starting at position {pos}")]
    Unterminated { kind: &'static str, pos: usize },
    #[error("unexpected {found} at position {pos}, expected {expected}")]
    Unexpected {
        found: String,
        pos: usize,
        expected: &'static str,
    },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unclosed '(' at position {pos}")]
    UnclosedParen { pos: usize },
    #[error("operands of {op} must be a tag name or a literal")]
    InvalidComparisonOperand { op: &'static str },
    #[error("operands of {op} must be comparisons")]
    InvalidLogicalOperand { op: &'static str },
    #[error("the expression must be a comparison")]
    NotAPredicate,
    #[error("the expression does not reference any tag")]
    NoIdentifier,
    #[error("parentheses are nested deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("the expression has more than {max} AND/OR operators")]
    TooManyConditions { max: usize },
}

impl QueryError {
    /// Storage error for a predicate read from `header`.
    pub fn into_header_error(self, header: &str) -> StorageError {
        StorageError::invalid_header(header, self)
    }

    /// Storage error for a predicate read from query parameter `param`.
    pub fn into_query_error(self, param: &str) -> StorageError {
        StorageError::with_message(
            ErrorCode::InvalidQueryParameterValue,
            format!("The value for query parameter {} is invalid: {}", param, self),
        )
    }
}

/// Checks that a parsed predicate references at least one identifier.
pub fn validate(expr: &Expr) -> Result<(), QueryError> {
    if expr.identifier_count() == 0 {
        return Err(QueryError::NoIdentifier);
    }
    Ok(())
}

/// Parses and validates a predicate.
pub fn parse_predicate(input: &str) -> Result<Expr, QueryError> {
    let expr = parse(input)?;
    validate(&expr)?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tags(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_evaluate_equality() {
        let set = tags(&[("tag1", "val1"), ("tag2", "val2")]);
        assert!(parse_predicate("tag1='val1'").unwrap().evaluate(&set));
        assert!(!parse_predicate("tag1<>'val1'").unwrap().evaluate(&set));
    }

    #[test]
    fn test_missing_tag_compares_false() {
        let set = tags(&[("tag1", "val1")]);
        assert!(!parse_predicate("nope = 'x'").unwrap().evaluate(&set));
        assert!(!parse_predicate("nope <> 'x'").unwrap().evaluate(&set));
    }

    #[test]
    fn test_string_ordering() {
        let set = tags(&[("date", "2021-06-01"), ("n", "10")]);
        assert!(parse_predicate("date >= '2021-01-01' AND date < '2022-01-01'")
            .unwrap()
            .evaluate(&set));
        // Values compare lexicographically, not numerically.
        assert!(parse_predicate("n < '9'").unwrap().evaluate(&set));
    }

    #[test]
    fn test_logical_combinations() {
        let set = tags(&[("a", "1"), ("b", "2")]);
        assert!(parse_predicate("a='0' OR b='2'").unwrap().evaluate(&set));
        assert!(!parse_predicate("a='1' AND (b='3' OR b='4')").unwrap().evaluate(&set));
        assert!(parse_predicate("(a='1') and (b='2' or b='3')").unwrap().evaluate(&set));
    }

    #[test]
    fn test_container_binding() {
        let set = tags(&[("a", "1")]);
        let expr = parse_predicate("@container = 'logs' AND a = '1'").unwrap();
        assert!(expr.evaluate(&TagBindings::new(&set, Some("logs"))));
        assert!(!expr.evaluate(&TagBindings::new(&set, Some("other"))));
        assert!(!expr.evaluate(&TagBindings::new(&set, None)));
    }

    #[test]
    fn test_validate_requires_identifier() {
        assert!(parse("'a' = 'a'").is_ok());
        assert_eq!(parse_predicate("'a' = 'a'").unwrap_err(), QueryError::NoIdentifier);
        assert_eq!(
            parse_predicate("('a' = 'b') OR ('c' = 'c')").unwrap_err(),
            QueryError::NoIdentifier
        );
    }

    #[test]
    fn test_header_error_names_header() {
        let err = parse_predicate("tag1 =").unwrap_err().into_header_error("x-ms-if-tags");
        assert_eq!(err.code, ErrorCode::InvalidHeaderValue);
        assert!(err.message.contains("x-ms-if-tags"));

        let err = QueryError::Empty.into_query_error("where");
        assert_eq!(err.code, ErrorCode::InvalidQueryParameterValue);
    }

    #[test]
    fn test_display_reparses() {
        let expr = parse_predicate("(a = 'it''s' OR \"b c\" > '1') AND @container = 'x'").unwrap();
        assert_eq!(parse_predicate(&expr.to_string()).unwrap(), expr);
    }
}
