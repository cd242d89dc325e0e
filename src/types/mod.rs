//! Scalar values stored in tuples and literals carried by statements

pub mod table;
pub mod timestamp;

pub use table::{Attribute, DefaultValue, IndexColumn, IndexDef, Table};

use std::cmp::Ordering;
use std::fmt;

/// A scalar stored in a tuple.
///
/// Every value crosses the connection boundary as its `Display` form, so
/// the formatting here is the canonical string of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Decimal(f64),
    /// Raw literal or formatted timestamp
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric reading of the value, parsing text when needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Ordering used by ORDER BY: nulls first, numbers numerically,
    /// everything else by canonical string.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.to_string().cmp(&other.to_string()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
        }
    }
}

/// How a literal was written in the statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Number,
    Date,
    Bool,
    Null,
    /// `NOW()`
    Now,
    /// `LOCALTIMESTAMP`
    LocalTimestamp,
    /// Bare word used as a value
    Raw,
}

/// A literal as written in SQL text: its kind and its raw lexeme.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub lexeme: String,
}

impl Literal {
    pub fn new(kind: LiteralKind, lexeme: impl Into<String>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
        }
    }

    pub fn number(lexeme: impl Into<String>) -> Self {
        Self::new(LiteralKind::Number, lexeme)
    }

    pub fn string(lexeme: impl Into<String>) -> Self {
        Self::new(LiteralKind::String, lexeme)
    }

    /// Literals that are evaluated when a row is written.
    pub fn is_generator(&self) -> bool {
        matches!(self.kind, LiteralKind::Now | LiteralKind::LocalTimestamp)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LiteralKind::String => write!(f, "'{}'", self.lexeme),
            _ => f.write_str(&self.lexeme),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_strings() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Decimal(3.0).to_string(), "3");
        assert_eq!(Value::Decimal(2.5).to_string(), "2.5");
        assert_eq!(Value::Text("abc".into()).to_string(), "abc");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_sort_cmp_mixes_numeric_text() {
        assert_eq!(Value::Integer(10).sort_cmp(&Value::Text("9".into())), Ordering::Greater);
        assert_eq!(Value::Text("b".into()).sort_cmp(&Value::Text("a".into())), Ordering::Greater);
        assert_eq!(Value::Null.sort_cmp(&Value::Integer(0)), Ordering::Less);
    }
}
