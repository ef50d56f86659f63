//! Error types for linking, execution and the stage pipeline.

use miette::Diagnostic;
use scribble_ir::Label;
use scribble_native::NativeError;
use scribble_source::{Diagnostic as Flattened, TokenLocation};
use scribble_types::DatumError;
use thiserror::Error;

use crate::stage::Stage;

/// Failures of the GENERATE stage.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum LinkError {
    #[error("no entry point: the program has no function '{name}'")]
    #[diagnostic(code(scribble::link::no_entry_point), help("set the entry point with the `entry` option"))]
    NoEntryPoint { name: String },

    #[error("{location}: call to unknown function '{name}'")]
    #[diagnostic(code(scribble::link::unknown_function))]
    UnknownFunction { name: String, location: TokenLocation },

    #[error("{location}: jump to undefined label {label} in '{function}'")]
    #[diagnostic(code(scribble::link::unknown_label))]
    UnknownLabel {
        label: Label,
        function: String,
        location: TokenLocation,
    },

    #[error("{location}: cannot bind '{function}': {source}")]
    #[diagnostic(code(scribble::link::native))]
    Native {
        function: String,
        #[source]
        source: NativeError,
        location: TokenLocation,
    },
}

impl LinkError {
    pub fn location(&self) -> Option<&TokenLocation> {
        match self {
            LinkError::NoEntryPoint { .. } => None,
            LinkError::UnknownFunction { location, .. }
            | LinkError::UnknownLabel { location, .. }
            | LinkError::Native { location, .. } => Some(location),
        }
    }

    pub fn to_diagnostic(&self) -> Flattened {
        Flattened::from_error(self, self.location().cloned())
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that end a running program.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("{location}: {source}")]
    #[diagnostic(code(scribble::runtime::operation))]
    Operation {
        #[source]
        source: DatumError,
        location: TokenLocation,
    },

    #[error("{location}: native call to '{function}' failed: {source}")]
    #[diagnostic(code(scribble::runtime::native))]
    Native {
        function: String,
        #[source]
        source: NativeError,
        location: TokenLocation,
    },

    #[error("{location}: stack underflow in '{function}'")]
    #[diagnostic(code(scribble::runtime::stack_underflow))]
    StackUnderflow { function: String, location: TokenLocation },

    #[error("{location}: stack overflow calling '{function}', more than {depth} frames")]
    #[diagnostic(
        code(scribble::runtime::stack_overflow),
        help("look for recursion without a base case, or raise max-call-depth")
    )]
    StackOverflow {
        function: String,
        depth: usize,
        location: TokenLocation,
    },

    #[error("{location}: call to unknown function '{name}'")]
    #[diagnostic(code(scribble::runtime::unknown_function))]
    UnknownFunction { name: String, location: TokenLocation },

    #[error("{location}: jump to undefined label {label} in '{function}'")]
    #[diagnostic(code(scribble::runtime::unknown_label))]
    UnknownLabel {
        label: Label,
        function: String,
        location: TokenLocation,
    },

    #[error("{location}: '{function}' expects {expected} argument(s), found {found}")]
    #[diagnostic(code(scribble::runtime::arity))]
    Arity {
        function: String,
        expected: usize,
        found: usize,
        location: TokenLocation,
    },

    #[error("no entry point: the program has no function '{name}'")]
    #[diagnostic(code(scribble::runtime::no_entry_point))]
    NoEntryPoint { name: String },
}

impl RuntimeError {
    pub fn location(&self) -> Option<&TokenLocation> {
        match self {
            RuntimeError::Operation { location, .. }
            | RuntimeError::Native { location, .. }
            | RuntimeError::StackUnderflow { location, .. }
            | RuntimeError::StackOverflow { location, .. }
            | RuntimeError::UnknownFunction { location, .. }
            | RuntimeError::UnknownLabel { location, .. }
            | RuntimeError::Arity { location, .. } => Some(location),
            RuntimeError::NoEntryPoint { .. } => None,
        }
    }

    pub fn to_diagnostic(&self) -> Flattened {
        Flattened::from_error(self, self.location().cloned())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A stage executor failed. Carries everything the stage reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} failed with {} error(s)", diagnostics.len())]
pub struct StageError {
    pub stage: Stage,
    pub diagnostics: Vec<Flattened>,
}

impl Diagnostic for StageError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(format!("scribble::engine::{}", self.stage)))
    }
}

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Stage(#[from] StageError),

    #[error("the session halted after the {stage} stage failed")]
    #[diagnostic(code(scribble::engine::halted), help("start a new session"))]
    Halted { stage: Stage },

    #[error("no source has been loaded")]
    #[diagnostic(code(scribble::engine::no_source))]
    NoSource,

    #[error("cannot {action} in the {stage} stage")]
    #[diagnostic(code(scribble::engine::wrong_stage))]
    WrongStage { action: &'static str, stage: Stage },

    #[error("no program is suspended")]
    #[diagnostic(code(scribble::engine::not_suspended))]
    NotSuspended,
}

pub type EngineResult<T> = Result<T, EngineError>;
