//! Parsing for Scribble.
//!
//! [`parse_text`] and [`parse_target`] turn source into a [`Program`] and the
//! list of every error found on the way. Parsing never stops at the first
//! error: each failed statement or item is recorded and skipped, so the tree
//! still covers the parts of the source that were fine.
//!
//! Expressions are parsed by precedence climbing over the table in
//! [`operators`].

pub mod ast;
mod display;
mod error;
pub mod operators;
mod parser;
mod program;

pub use ast::Program;
pub use error::{ParseError, ParseResult};
pub use parser::{Parser, DEFAULT_MAX_NESTING};
pub use program::{parse_target, parse_text, ParseOptions, SOURCE_EXTENSION};

use scribble_source::Lexer;

/// Parse a single expression such as `1 + 2 * 3`.
pub fn parse_expression(text: &str) -> ParseResult<ast::Expr> {
    let mut parser = Parser::new(Lexer::scribble("<expr>", text));
    let expr = parser.parse_standalone_expression();
    let (mut errors, _) = parser.finish();
    match expr {
        Ok(expr) if errors.is_empty() => Ok(expr),
        Ok(_) => Err(errors.remove(0)),
        Err(err) => Err(err),
    }
}
