//! Parsing of params scripts into a statement tree
//!
//! The grammar covered here is the subset of Python that generated params
//! scripts are written in: assignments, literal collections, f-strings, calls,
//! and the usual compound statements. Anything outside of it is reported as a
//! [`SyntaxError`], which the extraction layer treats as a signal to switch to
//! pattern-based recovery.

pub mod ast;
pub mod lexer;
pub mod parser;

use thiserror::Error;

pub use ast::{Constant, DictItem, Expr, ExprKind, FStringPart, Keyword, Stmt, UnaryOp};
pub use lexer::{lex, Span, Spanned, Token};
pub use parser::{parse_expression, parse_module};

/// A document did not parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: u32,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
