/// aiondb SQL engine
///
/// Architecture:
/// - Lexer: Tokenizes SQL strings with ordered matcher rules
/// - Parser: Builds a typed AST from tokens
/// - Executor: Dispatches statements to clause handlers
/// - Join/Functor: Nested-loop virtual rows feeding projection and COUNT

pub mod ast;
pub mod dml;
pub mod evaluator;
pub mod executor;
pub mod functor;
pub mod join;
pub mod lexer;
pub mod parser;
pub mod select;
pub mod token;

pub use ast::{Clause, Statement};
pub use executor::{ClauseHandler, QueryExecutor};
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};

use crate::error::Result;

/// Lex and parse `text` into zero or more statements.
pub fn parse(text: &str) -> Result<Vec<Statement>> {
    let tokens = token::strip_spaces(lexer::lex(text)?);
    Parser::new(tokens).parse_all()
}
