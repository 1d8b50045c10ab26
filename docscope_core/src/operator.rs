use std::fmt;

use bson::{Bson, Document};

use crate::error::{Error, Result};

/// Comparison operators understood by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Size,
    Exists,
    Mod,
    /// A comparator parsed from a token with no store counterpart.
    /// Rejected when the selector is compiled.
    Unrecognized(String),
}

impl Comparator {
    /// Parse a comparator name such as `gt` or `$gte`.
    /// Unknown names are kept so the failure surfaces at compile time.
    pub fn parse(token: &str) -> Self {
        match token.trim_start_matches('$').to_ascii_lowercase().as_str() {
            "eq" => Comparator::Eq,
            "ne" => Comparator::Ne,
            "gt" => Comparator::Gt,
            "gte" => Comparator::Gte,
            "lt" => Comparator::Lt,
            "lte" => Comparator::Lte,
            "in" => Comparator::In,
            "nin" => Comparator::Nin,
            "all" => Comparator::All,
            "size" => Comparator::Size,
            "exists" => Comparator::Exists,
            "mod" => Comparator::Mod,
            _ => Comparator::Unrecognized(token.to_string()),
        }
    }

    /// The store's prefixed operator token, e.g. `$gt`.
    pub fn native_token(&self) -> Result<&'static str> {
        Ok(match self {
            Comparator::Eq => "$eq",
            Comparator::Ne => "$ne",
            Comparator::Gt => "$gt",
            Comparator::Gte => "$gte",
            Comparator::Lt => "$lt",
            Comparator::Lte => "$lte",
            Comparator::In => "$in",
            Comparator::Nin => "$nin",
            Comparator::All => "$all",
            Comparator::Size => "$size",
            Comparator::Exists => "$exists",
            Comparator::Mod => "$mod",
            Comparator::Unrecognized(token) => {
                return Err(Error::InvalidOperator(token.clone()))
            }
        })
    }

    /// True for comparators whose operand is a list of field values.
    pub fn takes_list(&self) -> bool {
        matches!(self, Comparator::In | Comparator::Nin | Comparator::All)
    }

    /// True for comparators whose operand is not a field value.
    pub fn takes_literal(&self) -> bool {
        matches!(self, Comparator::Size | Comparator::Exists | Comparator::Mod)
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Unrecognized(token) => write!(f, "{token}"),
            known => match known.native_token() {
                Ok(token) => write!(f, "{}", token.trim_start_matches('$')),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

/// A field paired with a comparator. Usable as a condition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operator {
    field: String,
    comparator: Comparator,
}

impl Operator {
    pub fn new(field: impl Into<String>, comparator: Comparator) -> Self {
        Self {
            field: field.into(),
            comparator,
        }
    }

    /// Build an operator from a comparator name, see [`Comparator::parse`].
    pub fn parse(field: impl Into<String>, comparator: &str) -> Self {
        Self::new(field, Comparator::parse(comparator))
    }

    pub fn eq(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Eq)
    }

    pub fn ne(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Ne)
    }

    pub fn gt(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Gt)
    }

    pub fn gte(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Gte)
    }

    pub fn lt(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Lt)
    }

    pub fn lte(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Lte)
    }

    pub fn in_(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::In)
    }

    pub fn nin(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Nin)
    }

    pub fn all(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::All)
    }

    pub fn size(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Size)
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Exists)
    }

    pub fn modulo(field: impl Into<String>) -> Self {
        Self::new(field, Comparator::Mod)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Wrap an already serialized value as `{ "$op": value }`.
    /// Fails with [`Error::InvalidOperator`] naming the whole operator, e.g. `age.near`.
    pub fn to_selector_fragment(&self, value: Bson) -> Result<Document> {
        let token = self
            .comparator
            .native_token()
            .map_err(|_| Error::InvalidOperator(self.to_string()))?;
        let mut fragment = Document::new();
        fragment.insert(token, value);
        Ok(fragment)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.field, self.comparator)
    }
}
