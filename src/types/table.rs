/// Table metadata: attributes, defaults and index definitions
use super::timestamp::now_formatted;
use super::{Literal, LiteralKind, Value};
use crate::error::{EngineError, Result};

/// Default applied when an INSERT does not supply a value
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Literal(Literal),
    /// `DEFAULT NOW()` or `DEFAULT LOCALTIMESTAMP`
    CurrentTimestamp,
}

/// A named column of a table
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Declared type name, lowercased
    pub type_name: String,
    pub auto_increment: bool,
    pub unique: bool,
    pub not_null: bool,
    pub default: Option<DefaultValue>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into().to_lowercase(),
            auto_increment: false,
            unique: false,
            not_null: false,
            default: None,
        }
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    fn is_integer_type(&self) -> bool {
        matches!(
            self.type_name.as_str(),
            "int" | "int64" | "integer" | "bigint" | "smallint" | "serial" | "bigserial"
        )
    }

    fn is_decimal_type(&self) -> bool {
        matches!(
            self.type_name.as_str(),
            "numeric" | "decimal" | "float" | "real" | "double"
        )
    }

    fn is_bool_type(&self) -> bool {
        matches!(self.type_name.as_str(), "bool" | "boolean")
    }

    /// Convert a literal to the value stored for this attribute.
    pub fn coerce(&self, literal: &Literal) -> Result<Value> {
        match literal.kind {
            LiteralKind::Now | LiteralKind::LocalTimestamp => return Ok(Value::Text(now_formatted())),
            LiteralKind::Null => return Ok(Value::Null),
            _ => {}
        }

        let lexeme = literal.lexeme.as_str();
        if self.is_integer_type() {
            return lexeme
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.coercion_error(lexeme));
        }
        if self.is_decimal_type() {
            return lexeme
                .parse::<f64>()
                .map(Value::Decimal)
                .map_err(|_| self.coercion_error(lexeme));
        }
        if self.is_bool_type() {
            return match lexeme.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.coercion_error(lexeme)),
            };
        }
        Ok(Value::Text(lexeme.to_string()))
    }

    /// Value used when nothing was supplied.
    pub fn default_value(&self) -> Result<Value> {
        match &self.default {
            Some(DefaultValue::CurrentTimestamp) => Ok(Value::Text(now_formatted())),
            Some(DefaultValue::Literal(literal)) => self.coerce(literal),
            None => Ok(Value::Null),
        }
    }

    fn coercion_error(&self, lexeme: &str) -> EngineError {
        EngineError::TypeCoercion {
            lexeme: lexeme.to_string(),
            type_name: self.type_name.clone(),
        }
    }
}

/// Table is defined by a name and ordered attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl Table {
    /// Build a table, rejecting duplicate attribute names.
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Result<Self> {
        for (i, attr) in attributes.iter().enumerate() {
            if attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(EngineError::DuplicateAttribute(attr.name.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            attributes,
        })
    }

    pub fn position(&self, attribute: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.name == attribute)
    }

    pub fn attribute(&self, attribute: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == attribute)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Position of an attribute or a not-found error naming this table.
    pub fn require(&self, attribute: &str) -> Result<usize> {
        self.position(attribute)
            .ok_or_else(|| EngineError::attribute_not_found(&self.name, attribute))
    }
}

/// Column of an index definition
#[derive(Debug, Clone, PartialEq)]
pub struct IndexColumn {
    pub name: String,
    pub nocase: bool,
}

/// Index metadata. No index structure is built: scans stay linear.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<IndexColumn>,
    pub unique: bool,
}
