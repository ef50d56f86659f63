//! Source handling for Scribble.
//!
//! This crate owns everything up to and including tokens:
//! - [`Token`], [`TokenKind`] and [`TokenLocation`]
//! - [`LanguageProfile`], the pluggable keyword/directive table, and the
//!   [`ScribbleLanguage`] profile
//! - [`SourceStack`], the LIFO stack of sources that include directives push onto
//! - [`SourceResolver`], which finds the text behind an include or import
//! - the [`Lexer`] itself, with one- and two-token lookahead and `expect`
//! - [`Diagnostic`] and [`Report`], the flattened diagnostics every later
//!   stage reports through

mod diagnostic;
mod error;
mod lexer;
mod location;
mod profile;
mod resolver;
mod stack;
mod token;

pub use diagnostic::{Diagnostic, Report};
pub use error::{LexError, LexResult};
pub use lexer::{Lexer, LexerOptions, DEFAULT_MAX_INCLUDE_DEPTH};
pub use location::TokenLocation;
pub use profile::{DirectiveState, DirectiveStep, Keyword, LanguageProfile, ScribbleLanguage, SCRIBBLE_KEYWORDS};
pub use resolver::{FileResolver, MemoryResolver, ResolvedSource, SourceResolver};
pub use stack::{SourceFrame, SourceStack};
pub use token::{CommentStyle, NumberKind, QuoteKind, Token, TokenKind};
