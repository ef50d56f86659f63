use miette::Diagnostic;
use scribble_source::{Diagnostic as Flattened, TokenLocation};
use scribble_types::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum BindError {
    #[error("{location}: unknown name '{name}'")]
    #[diagnostic(code(scribble::bind::unknown_name))]
    UnknownName { name: String, location: TokenLocation },

    #[error("{location}: unknown function '{name}'")]
    #[diagnostic(code(scribble::bind::unknown_function))]
    UnknownFunction { name: String, location: TokenLocation },

    #[error("{location}: unknown type '{name}'")]
    #[diagnostic(code(scribble::bind::unknown_type))]
    UnknownType { name: String, location: TokenLocation },

    #[error("{location}: unknown intrinsic '{name}'")]
    #[diagnostic(code(scribble::bind::unknown_intrinsic), help("known intrinsics are 'print' and 'println'"))]
    UnknownIntrinsic { name: String, location: TokenLocation },

    #[error("{location}: expected {expected}, found {found}")]
    #[diagnostic(code(scribble::bind::type_mismatch))]
    TypeMismatch {
        expected: Type,
        found: Type,
        location: TokenLocation,
    },

    #[error("{location}: operator '{op}' cannot be applied to {ty}")]
    #[diagnostic(code(scribble::bind::invalid_operand))]
    InvalidOperand {
        op: String,
        ty: Type,
        location: TokenLocation,
    },

    #[error("{location}: cannot cast {from} to {to}")]
    #[diagnostic(code(scribble::bind::invalid_cast))]
    InvalidCast {
        from: Type,
        to: Type,
        location: TokenLocation,
    },

    #[error("{location}: '{name}' takes {expected} argument(s), {found} given")]
    #[diagnostic(code(scribble::bind::arity))]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        location: TokenLocation,
    },

    #[error("{location}: cannot assign to '{name}'")]
    #[diagnostic(code(scribble::bind::not_assignable))]
    NotAssignable { name: String, location: TokenLocation },

    #[error("{location}: '{name}' is already defined")]
    #[diagnostic(code(scribble::bind::duplicate))]
    Duplicate { name: String, location: TokenLocation },

    #[error("{location}: cannot infer the type of '{name}'")]
    #[diagnostic(code(scribble::bind::missing_type), help("add a type annotation or an initializer"))]
    MissingType { name: String, location: TokenLocation },

    #[error("{location}: '{keyword}' outside of a loop")]
    #[diagnostic(code(scribble::bind::misplaced_control))]
    OutsideLoop { keyword: String, location: TokenLocation },

    #[error("{location}: integer literal {value} does not fit in {ty}")]
    #[diagnostic(code(scribble::bind::literal_out_of_range))]
    LiteralOutOfRange {
        value: String,
        ty: Type,
        location: TokenLocation,
    },

    #[error("{location}: {message}")]
    #[diagnostic(code(scribble::bind::unsupported))]
    Unsupported { message: String, location: TokenLocation },
}

impl BindError {
    pub fn location(&self) -> &TokenLocation {
        match self {
            BindError::UnknownName { location, .. }
            | BindError::UnknownFunction { location, .. }
            | BindError::UnknownType { location, .. }
            | BindError::UnknownIntrinsic { location, .. }
            | BindError::TypeMismatch { location, .. }
            | BindError::InvalidOperand { location, .. }
            | BindError::InvalidCast { location, .. }
            | BindError::ArityMismatch { location, .. }
            | BindError::NotAssignable { location, .. }
            | BindError::Duplicate { location, .. }
            | BindError::MissingType { location, .. }
            | BindError::OutsideLoop { location, .. }
            | BindError::LiteralOutOfRange { location, .. }
            | BindError::Unsupported { location, .. } => location,
        }
    }

    pub fn to_diagnostic(&self) -> Flattened {
        Flattened::from_error(self, Some(self.location().clone()))
    }
}

pub type BindResult<T> = Result<T, BindError>;
