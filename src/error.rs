//! Error types for the aiondb SQL engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    // Lexing and parsing
    #[error("cannot lex input at character {position}, near \"{remainder}\"")]
    Lex { position: usize, remainder: String },

    #[error("syntax error near {context}: {message}")]
    Syntax { message: String, context: String },

    // Semantic errors
    #[error("table {0} does not exist")]
    TableNotFound(String),

    #[error("table {0} already exists")]
    TableExists(String),

    #[error("index {0} already exists")]
    IndexExists(String),

    #[error("attribute {attribute} does not exist in table {table}")]
    AttributeNotFound { table: String, attribute: String },

    #[error("attribute {0} not found in row")]
    AttributeNotInRow(String),

    #[error("attribute {0} is ambiguous")]
    AmbiguousAttribute(String),

    #[error("attribute {0} declared twice")]
    DuplicateAttribute(String),

    #[error("unique constraint violation on {table}.{attribute}: value {value}")]
    UniqueViolation {
        table: String,
        attribute: String,
        value: String,
    },

    #[error("null value in column {0} violates not-null constraint")]
    NotNullViolation(String),

    #[error("cannot convert {lexeme} to {type_name}")]
    TypeCoercion { lexeme: String, type_name: String },

    #[error("malformed statement: {0}")]
    Malformed(String),

    // Dispatch
    #[error("no executor registered for {0}")]
    Dispatch(String),

    #[error("fatal error: {0}")]
    RuntimeFault(String),

    // Transport
    #[error("connection error: {0}")]
    Connection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl EngineError {
    /// Syntax error anchored on a token with its neighbours.
    pub fn syntax(message: impl Into<String>, context: impl Into<String>) -> Self {
        EngineError::Syntax {
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn attribute_not_found(table: &str, attribute: &str) -> Self {
        EngineError::AttributeNotFound {
            table: table.to_string(),
            attribute: attribute.to_string(),
        }
    }
}
