use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::location::TokenLocation;

/// Errors raised while turning source text into tokens.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum LexError {
    #[error("{location}: expected {expected}, got {found}")]
    #[diagnostic(code(scribble::lex::unexpected))]
    Unexpected {
        expected: String,
        found: String,
        location: TokenLocation,
        #[label("unexpected {found}")]
        span: SourceSpan,
    },

    #[error("{location}: invalid token '{text}'")]
    #[diagnostic(code(scribble::lex::invalid_token))]
    InvalidToken {
        text: String,
        location: TokenLocation,
        #[label("not a valid token")]
        span: SourceSpan,
    },

    #[error("{location}: {message}")]
    #[diagnostic(code(scribble::lex::directive))]
    Directive {
        message: String,
        location: TokenLocation,
        #[label("in this directive")]
        span: SourceSpan,
    },

    #[error("{location}: cannot find included source '{name}'")]
    #[diagnostic(
        code(scribble::lex::include_not_found),
        help("includes are looked up next to the including file, then in the configured include paths")
    )]
    IncludeNotFound { name: String, location: TokenLocation },

    #[error("{location}: source '{name}' includes itself")]
    #[diagnostic(code(scribble::lex::include_cycle))]
    IncludeCycle { name: String, location: TokenLocation },

    #[error("{location}: including '{name}' would exceed the maximum include depth of {depth}")]
    #[diagnostic(code(scribble::lex::include_too_deep))]
    IncludeTooDeep {
        name: String,
        depth: usize,
        location: TokenLocation,
    },
}

impl LexError {
    pub fn location(&self) -> &TokenLocation {
        match self {
            LexError::Unexpected { location, .. }
            | LexError::InvalidToken { location, .. }
            | LexError::Directive { location, .. }
            | LexError::IncludeNotFound { location, .. }
            | LexError::IncludeCycle { location, .. }
            | LexError::IncludeTooDeep { location, .. } => location,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
