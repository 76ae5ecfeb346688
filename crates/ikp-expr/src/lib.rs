//! IKP condition language: lexer and parser for `if` action conditions.
//!
//! ```text
//! "${age} >= 18 and accepted" → Lexer → Parser → Expr
//! ```

pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::Lexer;
pub use parser::{Parser, MAX_DEPTH};
pub use token::{Token, TokenKind};

use ikp_types::expr::{Expr, Span};

/// A lexing or parsing failure, located inside the condition string.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (at offset {})", .span.start)]
pub struct ExprError {
    pub message: String,
    pub span: Span,
}

impl ExprError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Parse a complete condition.
pub fn parse_condition(source: &str) -> Result<Expr, ExprError> {
    let tokens = Lexer::new(source).lex()?;
    Parser::new(tokens).parse()
}
