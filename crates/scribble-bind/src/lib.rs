//! # Scribble binder
//!
//! The BIND stage. Takes the [`Program`](scribble_syntax::Program) the parser
//! produced and resolves every name and every type in it, producing a
//! [`BoundProgram`] that the IR generator can lower without looking anything
//! up again.
//!
//! The stage is expressed as the [`Binder`] trait so the pipeline only
//! depends on the contract:
//!
//! - the input is a complete program, all modules merged,
//! - the output is either a bound program or every error found,
//! - a bound program refers to functions by [`FunctionId`], to globals by
//!   [`GlobalId`] and to locals by slot.
//!
//! [`DefaultBinder`] is the implementation the engine uses. Its rules:
//!
//! - Functions may be called before they are declared; globals may only
//!   refer to globals declared above them.
//! - `print` and `println` are available without a declaration. Their
//!   argument is converted to a string.
//! - Unsuffixed integer literals take the type the context expects, falling
//!   back to `i32`. Suffixed literals (`255 u8`) have exactly that type.
//! - There are no implicit conversions otherwise; use `as`.
//!
//! ```
//! use scribble_bind::{Binder, DefaultBinder};
//! use scribble_syntax::{parse_text, ParseOptions};
//!
//! let (program, errors) = parse_text("main", "func main(): i32 { return 1 + 2; }", &ParseOptions::default());
//! assert!(errors.is_empty());
//! let bound = DefaultBinder.bind(&program).unwrap();
//! assert_eq!(bound.functions[0].name, "main");
//! ```

mod binder;
mod bound;
mod error;

pub use binder::{Binder, DefaultBinder};
pub use bound::*;
pub use error::{BindError, BindResult};
