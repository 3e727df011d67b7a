//! Recursive-descent parser for tag predicates.
//!
//! ```text
//! or         := and ( OR and )*
//! and        := comparison ( AND comparison )*
//! comparison := term ( ( = | <> | > | >= | < | <= ) term )?
//! term       := '(' or ')' | identifier | "quoted identifier" | 'literal'
//! ```
//!
//! `AND`/`OR` are case-insensitive. Inside a literal, `''` is a quote.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use super::ast::{Expr, Operator};
use super::QueryError;

/// Deepest parenthesis nesting accepted.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Most `AND`/`OR` operators accepted in one expression.
pub const MAX_LOGICAL_OPERATORS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Literal(String),
    LParen,
    RParen,
    Op(Operator),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier {}", name),
            Token::Literal(value) => write!(f, "literal '{}'", value),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Op(op) => write!(f, "operator {}", op.as_str()),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '+' | '@')
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn next_if_eq(&mut self, expected: char) -> bool {
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    /// Reads up to the closing `quote`; `escapable` quotes may be doubled.
    fn read_quoted(
        &mut self,
        quote: char,
        start: usize,
        escapable: bool,
    ) -> Result<String, QueryError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => {
                    if escapable && self.next_if_eq(quote) {
                        value.push(quote);
                    } else {
                        return Ok(value);
                    }
                }
                Some((_, c)) => value.push(c),
                None => {
                    return Err(QueryError::Unterminated {
                        kind: if escapable { "literal" } else { "identifier" },
                        pos: start,
                    })
                }
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, QueryError> {
        let mut tokens = Vec::new();

        while let Some((pos, c)) = self.chars.next() {
            let token = match c {
                c if c.is_whitespace() => continue,
                '(' => Token::LParen,
                ')' => Token::RParen,
                '=' => Token::Op(Operator::Eq),
                '<' if self.next_if_eq('>') => Token::Op(Operator::Ne),
                '<' if self.next_if_eq('=') => Token::Op(Operator::Le),
                '<' => Token::Op(Operator::Lt),
                '>' if self.next_if_eq('=') => Token::Op(Operator::Ge),
                '>' => Token::Op(Operator::Gt),
                '\'' => Token::Literal(self.read_quoted('\'', pos, true)?),
                '"' => Token::Ident(self.read_quoted('"', pos, false)?),
                c if is_identifier_char(c) => {
                    let mut name = c.to_string();
                    while let Some((_, c)) = self.chars.next_if(|&(_, c)| is_identifier_char(c)) {
                        name.push(c);
                    }
                    if name.eq_ignore_ascii_case("and") {
                        Token::Op(Operator::And)
                    } else if name.eq_ignore_ascii_case("or") {
                        Token::Op(Operator::Or)
                    } else {
                        Token::Ident(name)
                    }
                }
                c => return Err(QueryError::UnexpectedChar { ch: c, pos }),
            };
            tokens.push((pos, token));
        }

        Ok(tokens)
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    depth: usize,
    logical_operators: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_op(&mut self, op: Operator) -> bool {
        if self.peek() == Some(&Token::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Counts a logical operator against the limit. Chains build
    /// left-nested trees, so this also caps how deep they get.
    fn count_logical(&mut self) -> Result<(), QueryError> {
        self.logical_operators += 1;
        if self.logical_operators > MAX_LOGICAL_OPERATORS {
            return Err(QueryError::TooManyConditions {
                max: MAX_LOGICAL_OPERATORS,
            });
        }
        Ok(())
    }

    fn logical(left: Expr, op: Operator, right: Expr) -> Result<Expr, QueryError> {
        if !left.is_predicate() || !right.is_predicate() {
            return Err(QueryError::InvalidLogicalOperand { op: op.as_str() });
        }
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and()?;
        while self.eat_op(Operator::Or) {
            self.count_logical()?;
            let right = self.parse_and()?;
            left = Self::logical(left, Operator::Or, right)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_comparison()?;
        while self.eat_op(Operator::And) {
            self.count_logical()?;
            let right = self.parse_comparison()?;
            left = Self::logical(left, Operator::And, right)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, QueryError> {
        let left = self.parse_term()?;

        let op = match self.peek() {
            Some(Token::Op(op)) if !op.is_logical() => *op,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.parse_term()?;

        if left.is_predicate() || right.is_predicate() {
            return Err(QueryError::InvalidComparisonOperand { op: op.as_str() });
        }
        Ok(Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_term(&mut self) -> Result<Expr, QueryError> {
        match self.next() {
            Some((_, Token::Ident(name))) => Ok(Expr::Key(name)),
            Some((_, Token::Literal(value))) => Ok(Expr::Literal(value)),
            Some((pos, Token::LParen)) => {
                if self.depth == MAX_NESTING_DEPTH {
                    return Err(QueryError::TooDeep {
                        max: MAX_NESTING_DEPTH,
                    });
                }
                self.depth += 1;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some((_, Token::RParen)) => {}
                    Some((pos, token)) => {
                        return Err(QueryError::Unexpected {
                            found: token.to_string(),
                            pos,
                            expected: "')'",
                        })
                    }
                    None => return Err(QueryError::UnclosedParen { pos }),
                }
                if !inner.is_predicate() {
                    return Err(QueryError::NotAPredicate);
                }
                Ok(Expr::Group(Box::new(inner)))
            }
            Some((pos, token)) => Err(QueryError::Unexpected {
                found: token.to_string(),
                pos,
                expected: "an identifier, a literal or '('",
            }),
            None => Err(QueryError::UnexpectedEnd {
                expected: "an identifier, a literal or '('",
            }),
        }
    }
}

/// Parses a predicate into an expression tree without checking that it
/// references any identifier.
pub fn parse(input: &str) -> Result<Expr, QueryError> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(QueryError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        logical_operators: 0,
    };
    let expr = parser.parse_or()?;

    if let Some((pos, token)) = parser.next() {
        return Err(QueryError::Unexpected {
            found: token.to_string(),
            pos,
            expected: "end of expression",
        });
    }
    if !expr.is_predicate() {
        return Err(QueryError::NotAPredicate);
    }

    Ok(expr)
}
