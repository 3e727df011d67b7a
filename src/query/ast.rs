//! Tag predicate syntax tree and evaluator.

use std::collections::HashMap;
use std::fmt;

/// Name of the built-in identifier bound to the blob's container.
pub const CONTAINER_IDENTIFIER: &str = "@container";

/// Binary operators, logical and comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
        }
    }
}

/// A parsed tag predicate. Immutable once built and reusable across
/// evaluations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A tag name or `@container`.
    Key(String),
    /// A single-quoted string literal.
    Literal(String),
    Binary {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    /// A parenthesized expression.
    Group(Box<Expr>),
}

/// Source of values for the identifiers of a predicate.
pub trait TagLookup {
    fn lookup(&self, key: &str) -> Option<&str>;
}

impl TagLookup for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

/// A blob's tags plus the `@container` binding.
#[derive(Debug, Clone, Copy)]
pub struct TagBindings<'a> {
    pub tags: &'a HashMap<String, String>,
    pub container: Option<&'a str>,
}

impl<'a> TagBindings<'a> {
    pub fn new(tags: &'a HashMap<String, String>, container: Option<&'a str>) -> Self {
        Self { tags, container }
    }
}

impl TagLookup for TagBindings<'_> {
    fn lookup(&self, key: &str) -> Option<&str> {
        if key == CONTAINER_IDENTIFIER {
            self.container
        } else {
            self.tags.lookup(key)
        }
    }
}

impl Expr {
    /// Number of identifier references in the tree.
    pub fn identifier_count(&self) -> usize {
        match self {
            Expr::Key(_) => 1,
            Expr::Literal(_) => 0,
            Expr::Binary { left, right, .. } => left.identifier_count() + right.identifier_count(),
            Expr::Group(inner) => inner.identifier_count(),
        }
    }

    /// Whether the node yields a boolean rather than a value.
    pub fn is_predicate(&self) -> bool {
        matches!(self, Expr::Binary { .. } | Expr::Group(_))
    }

    fn operand<'a, L: TagLookup + ?Sized>(&'a self, lookup: &'a L) -> Option<&'a str> {
        match self {
            Expr::Key(key) => lookup.lookup(key),
            Expr::Literal(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Evaluates the predicate. Comparisons against a missing tag are false;
    /// values compare as strings.
    pub fn evaluate<L: TagLookup + ?Sized>(&self, lookup: &L) -> bool {
        match self {
            Expr::Group(inner) => inner.evaluate(lookup),
            Expr::Binary { left, op, right } => match op {
                Operator::And => left.evaluate(lookup) && right.evaluate(lookup),
                Operator::Or => left.evaluate(lookup) || right.evaluate(lookup),
                _ => match (left.operand(lookup), right.operand(lookup)) {
                    (Some(a), Some(b)) => match op {
                        Operator::Eq => a == b,
                        Operator::Ne => a != b,
                        Operator::Gt => a > b,
                        Operator::Ge => a >= b,
                        Operator::Lt => a < b,
                        Operator::Le => a <= b,
                        Operator::And | Operator::Or => false,
                    },
                    _ => false,
                },
            },
            Expr::Key(_) | Expr::Literal(_) => false,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Key(key) => write!(f, "\"{}\"", key),
            Expr::Literal(value) => write!(f, "'{}'", value.replace('\'', "''")),
            Expr::Binary { left, op, right } => write!(f, "{} {} {}", left, op.as_str(), right),
            Expr::Group(inner) => write!(f, "({})", inner),
        }
    }
}
