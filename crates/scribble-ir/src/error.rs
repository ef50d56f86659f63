//! Error types for IR generation.

use miette::Diagnostic;
use scribble_source::{Diagnostic as Flattened, TokenLocation};
use scribble_types::DatumError;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum LoweringError {
    /// A construct the IR has no lowering for.
    #[error("{location}: {construct} is not supported here")]
    #[diagnostic(code(scribble::ir::unsupported))]
    Unsupported { construct: String, location: TokenLocation },

    /// `evaluate` met something that needs a running program.
    #[error("{location}: {what} cannot be evaluated as a constant")]
    #[diagnostic(code(scribble::ir::not_constant), help("only literals and operators are allowed"))]
    NotConstant { what: String, location: TokenLocation },

    #[error("{location}: {source}")]
    #[diagnostic(code(scribble::ir::evaluation))]
    Evaluation {
        #[source]
        source: DatumError,
        location: TokenLocation,
    },

    /// The bound program broke an assumption of the generator.
    #[error("{location}: internal lowering error: {message}")]
    #[diagnostic(code(scribble::ir::internal))]
    Internal { message: String, location: TokenLocation },
}

impl LoweringError {
    pub fn unsupported(construct: impl Into<String>, location: &TokenLocation) -> Self {
        LoweringError::Unsupported {
            construct: construct.into(),
            location: location.clone(),
        }
    }

    pub fn not_constant(what: impl Into<String>, location: &TokenLocation) -> Self {
        LoweringError::NotConstant {
            what: what.into(),
            location: location.clone(),
        }
    }

    pub fn internal(message: impl Into<String>, location: &TokenLocation) -> Self {
        LoweringError::Internal {
            message: message.into(),
            location: location.clone(),
        }
    }

    pub fn location(&self) -> &TokenLocation {
        match self {
            LoweringError::Unsupported { location, .. }
            | LoweringError::NotConstant { location, .. }
            | LoweringError::Evaluation { location, .. }
            | LoweringError::Internal { location, .. } => location,
        }
    }

    pub fn to_diagnostic(&self) -> Flattened {
        Flattened::from_error(self, Some(self.location().clone()))
    }
}

pub type LoweringResult<T> = Result<T, LoweringError>;
