//! Order expressions and their normalization into sort fields.
//!
//! Accepted forms:
//! - a bare field, sorted ascending: `OrderTerm::field("bar")`
//! - a field with an explicit direction: `OrderTerm::desc("bar")`
//! - a comma separated expression with optional `ASC`/`DESC` suffixes:
//!   `"foo DESC, baz"`
//! - any sequence of the above, in order

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Parse a direction token, case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        }
    }

    /// Token used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ascending",
            Direction::Descending => "descending",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order clause as written by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderTerm {
    Field(String),
    Directed(String, Direction),
    Expr(String),
}

impl OrderTerm {
    pub fn field(field: impl Into<String>) -> Self {
        OrderTerm::Field(field.into())
    }

    pub fn asc(field: impl Into<String>) -> Self {
        OrderTerm::Directed(field.into(), Direction::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        OrderTerm::Directed(field.into(), Direction::Descending)
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        OrderTerm::Expr(expr.into())
    }

    /// Normalize into sort fields, appending to `out`.
    fn normalize_into(&self, out: &mut Vec<SortField>) -> Result<()> {
        match self {
            OrderTerm::Field(field) => {
                out.push(SortField::new(checked_field(field, self)?, Direction::Ascending))
            }
            OrderTerm::Directed(field, direction) => {
                out.push(SortField::new(checked_field(field, self)?, *direction))
            }
            OrderTerm::Expr(expr) => {
                for term in expr.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    out.push(parse_term(term)?);
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderTerm::Field(field) => write!(f, "{field}"),
            OrderTerm::Directed(field, direction) => write!(f, "{field} {direction}"),
            OrderTerm::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

impl From<&str> for OrderTerm {
    fn from(expr: &str) -> Self {
        OrderTerm::expr(expr)
    }
}

impl From<String> for OrderTerm {
    fn from(expr: String) -> Self {
        OrderTerm::Expr(expr)
    }
}

/// A sequence of order terms, as passed to `Scope::order`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSpec {
    terms: Vec<OrderTerm>,
}

impl OrderSpec {
    pub fn into_terms(self) -> Vec<OrderTerm> {
        self.terms
    }
}

impl From<OrderTerm> for OrderSpec {
    fn from(term: OrderTerm) -> Self {
        Self { terms: vec![term] }
    }
}

impl From<&str> for OrderSpec {
    fn from(expr: &str) -> Self {
        OrderTerm::from(expr).into()
    }
}

impl From<String> for OrderSpec {
    fn from(expr: String) -> Self {
        OrderTerm::from(expr).into()
    }
}

impl<T: Into<OrderTerm>> From<Vec<T>> for OrderSpec {
    fn from(terms: Vec<T>) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

impl<T: Into<OrderTerm>, const N: usize> From<[T; N]> for OrderSpec {
    fn from(terms: [T; N]) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

/// A normalized `(field, direction)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortField {
    pub field: String,
    pub direction: Direction,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Normalize order terms into sort fields, preserving their order.
/// Field names are returned as written; alias resolution is the caller's job.
pub fn normalize(terms: &[OrderTerm]) -> Result<Vec<SortField>> {
    let mut out = Vec::with_capacity(terms.len());
    for term in terms {
        term.normalize_into(&mut out)?;
    }
    Ok(out)
}

fn checked_field<'a>(field: &'a str, term: &OrderTerm) -> Result<&'a str> {
    let field = field.trim();
    if field.is_empty() {
        return Err(Error::InvalidOrderSpec(format!("missing field in '{term}'")));
    }
    Ok(field)
}

// A single term of an expression: `field` or `field DIRECTION`.
fn parse_term(term: &str) -> Result<SortField> {
    let mut tokens = term.split_whitespace();
    let (field, direction) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(field), None, None) => (field, Direction::Ascending),
        (Some(field), Some(direction), None) => match Direction::parse(direction) {
            Some(direction) => (field, direction),
            None => return Err(Error::InvalidOrderSpec(term.to_string())),
        },
        _ => return Err(Error::InvalidOrderSpec(term.to_string())),
    };
    Ok(SortField::new(field, direction))
}
