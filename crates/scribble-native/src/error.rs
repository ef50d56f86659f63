use miette::Diagnostic;
use scribble_types::Type;
use thiserror::Error;

/// Failures of the native bridge. None of them are fatal to the caller: the
/// engine turns them into runtime errors of the running program.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum NativeError {
    #[error("cannot load library '{image}': {reason}")]
    #[diagnostic(code(scribble::native::image_not_found))]
    ImageNotFound { image: String, reason: String },

    #[error("no loaded library exports '{name}'")]
    #[diagnostic(
        code(scribble::native::symbol_not_found),
        help("add the library that defines it to the `libraries` option")
    )]
    SymbolNotFound { name: String },

    #[error("'{name}' takes {expected} argument(s), {found} given")]
    #[diagnostic(code(scribble::native::arity))]
    ArityMismatch { name: String, expected: usize, found: usize },

    #[error("'{name}': {reason}")]
    #[diagnostic(code(scribble::native::unsupported_type))]
    UnsupportedNativeType { name: String, reason: String },
}

impl NativeError {
    pub(crate) fn unsupported(name: &str, reason: impl Into<String>) -> Self {
        NativeError::UnsupportedNativeType {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_type(name: &str, ty: Type, position: &str) -> Self {
        Self::unsupported(name, format!("{} cannot be passed as {}", ty, position))
    }
}

pub type NativeResult<T> = Result<T, NativeError>;
