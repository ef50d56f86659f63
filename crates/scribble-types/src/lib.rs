//! The Scribble type model and runtime values.
//!
//! Scribble only has primitive types. [`Type`] names them, [`BinaryOp`] and
//! [`UnaryOp`] are the operators the language defines over them, and
//! [`Datum`] is the runtime value every later stage computes with, including
//! the native bridge.

mod datum;
mod error;
mod ops;
mod signature;
mod ty;

pub use datum::Datum;
pub use error::{DatumError, DatumResult};
pub use ops::{BinaryOp, UnaryOp};
pub use signature::Signature;
pub use ty::Type;
