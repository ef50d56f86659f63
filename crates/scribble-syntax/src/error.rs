use miette::{Diagnostic, SourceSpan};
use scribble_source::{Diagnostic as Flattened, LexError, TokenLocation};
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    #[error("{location}: expected {expected}, got {found}")]
    #[diagnostic(code(scribble::parse::expected))]
    Expected {
        expected: String,
        found: String,
        location: TokenLocation,
        #[label("expected {expected}")]
        span: SourceSpan,
    },

    #[error("{location}: invalid literal '{text}': {reason}")]
    #[diagnostic(code(scribble::parse::invalid_literal))]
    InvalidLiteral {
        text: String,
        reason: String,
        location: TokenLocation,
        #[label("in this literal")]
        span: SourceSpan,
    },

    #[error("{location}: only named functions can be called")]
    #[diagnostic(code(scribble::parse::not_callable))]
    NotCallable {
        location: TokenLocation,
        #[label("this is not a function name")]
        span: SourceSpan,
    },

    #[error("{location}: nesting deeper than {limit} levels")]
    #[diagnostic(
        code(scribble::parse::too_deep),
        help("split the expression or block into smaller pieces")
    )]
    TooDeep {
        limit: usize,
        location: TokenLocation,
        #[label("too deeply nested")]
        span: SourceSpan,
    },

    #[error("{location}: cannot find imported module '{name}'")]
    #[diagnostic(code(scribble::parse::import_not_found))]
    ImportNotFound { name: String, location: TokenLocation },

    #[error("cannot read {path}: {message}")]
    #[diagnostic(code(scribble::parse::io))]
    Io { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(LexError),
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        match err {
            LexError::Unexpected {
                expected,
                found,
                location,
                span,
            } => ParseError::Expected {
                expected,
                found,
                location,
                span,
            },
            other => ParseError::Lex(other),
        }
    }
}

impl ParseError {
    pub fn location(&self) -> Option<&TokenLocation> {
        match self {
            ParseError::Expected { location, .. }
            | ParseError::InvalidLiteral { location, .. }
            | ParseError::NotCallable { location, .. }
            | ParseError::TooDeep { location, .. }
            | ParseError::ImportNotFound { location, .. } => Some(location),
            ParseError::Io { .. } => None,
            ParseError::Lex(err) => Some(err.location()),
        }
    }

    pub fn to_diagnostic(&self) -> Flattened {
        Flattened::from_error(self, self.location().cloned())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
