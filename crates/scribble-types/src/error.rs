use miette::Diagnostic;
use thiserror::Error;

use crate::ty::Type;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum DatumError {
    #[error("division by zero")]
    #[diagnostic(code(scribble::runtime::division_by_zero))]
    DivisionByZero,

    #[error("operator '{op}' is not defined for {lhs} and {rhs}")]
    #[diagnostic(code(scribble::runtime::operand_mismatch))]
    OperandMismatch { op: String, lhs: Type, rhs: Type },

    #[error("cannot cast {from} to {to}")]
    #[diagnostic(code(scribble::runtime::invalid_cast))]
    InvalidCast { from: Type, to: Type },

    #[error("integer literal {value} does not fit in {ty}")]
    #[diagnostic(code(scribble::runtime::literal_out_of_range))]
    LiteralOutOfRange { value: String, ty: Type },
}

pub type DatumResult<T> = Result<T, DatumError>;
