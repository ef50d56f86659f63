//! # Scribble IR
//!
//! The INTERMEDIATE stage: lowers a [`BoundProgram`](scribble_bind::BoundProgram)
//! into an [`IRProgram`], a map from function name to [`IRFunction`].
//!
//! The IR is a small stack machine. Every [`Instruction`] carries the source
//! location of the statement or expression it was lowered from, which is what
//! the engine reports when it suspends at an instruction.
//!
//! ## Shape of the generated code
//!
//! *   Global initialisers are collected into a synthetic function named
//!     [`INIT_FUNCTION`] that runs before the entry point.
//! *   Control flow is lowered to [`Operation::Label`] pseudo-instructions and
//!     jumps. `&&` and `||` short-circuit.
//! *   A function whose body can fall off the end returns the default value
//!     of its return type.
//! *   Functions bound to native symbols and engine intrinsics have no body;
//!     calls to native functions use [`Operation::NativeCall`].
//!
//! [`evaluate`] lowers a single expression and runs it through a constant
//! evaluator, independent of any program.

mod error;
mod evaluate;
mod generate;
mod instruction;
mod program;

pub use error::{LoweringError, LoweringResult};
pub use evaluate::evaluate;
pub use generate::{generate, GenerateOptions};
pub use instruction::{Instruction, Label, Operation};
pub use program::{FunctionKind, IRFunction, IRGlobal, IRProgram, INIT_FUNCTION};
